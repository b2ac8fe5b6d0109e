use anyhow::Result;
use console::{style, Emoji};

use crate::config::Config;
use crate::search::{
    create_embedder, create_reranker, DocType, Mode, PipelineContext, Query, QueryPipeline,
};

use super::{open_store, preview};

static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "");
static DOC: Emoji<'_, '_> = Emoji("📄 ", "");

pub struct QueryOptions {
    pub top_k_retrieve: Option<usize>,
    pub top_k_final: Option<usize>,
    pub doc_type: Option<String>,
    pub json: bool,
    pub fallback: bool,
}

pub async fn run_query(config: &Config, question: &str, options: QueryOptions) -> Result<()> {
    if !config.store.path.exists() {
        anyhow::bail!("No knowledge base found. Run `campuslens build` first.");
    }

    let store = open_store(config).await?;
    let collection = config.store.collection.clone();

    let ctx = if options.fallback || !config.embedder.enabled || !config.reranker.enabled {
        PipelineContext::fallback(store, collection, config.search.clone())
    } else {
        let embedder = create_embedder(&config.embedder)?;
        let reranker = create_reranker(&config.reranker)?;
        PipelineContext::initialize(
            store,
            collection,
            Some(embedder),
            Some(reranker),
            config.search.clone(),
        )
        .await
    };
    let pipeline = QueryPipeline::new(ctx);

    let mut query = Query::new(question).top_k(
        options.top_k_retrieve.unwrap_or(config.search.top_k_retrieve),
        options.top_k_final.unwrap_or(config.search.top_k_final),
    );
    if let Some(doc_type) = &options.doc_type {
        query = query.doc_type(DocType::parse(doc_type));
    }

    let result = pipeline.query(&query).await?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!(
        "\n{}{} {}\n",
        SEARCH,
        style(&result.answer).bold(),
        style(format!("[{} mode]", result.mode)).dim()
    );
    if result.mode == Mode::Fallback && !options.fallback {
        println!(
            "  {}\n",
            style("Model providers unavailable; ranked by keyword overlap.").yellow()
        );
    }

    for (i, (doc, score)) in result.documents.iter().zip(&result.scores).enumerate() {
        if doc.is_placeholder() {
            println!("  {}", style(&doc.text).italic());
            continue;
        }

        println!(
            "{} {}. {} {}",
            DOC,
            style(i + 1).dim(),
            style(&doc.id).green(),
            style(format!("({})", doc.doc_type)).dim()
        );
        println!("   Score: {}", style(format!("{:.3}", score)).cyan());
        println!("   {}", style(preview(&doc.text, 200)).dim());
        println!();
    }

    Ok(())
}
