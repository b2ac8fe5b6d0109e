use anyhow::Result;
use console::{style, Emoji};

use crate::config::Config;

use super::open_store;

static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "");

pub async fn run_status(config: &Config, json: bool) -> Result<()> {
    let path = &config.store.path;
    if !path.exists() {
        println!("{}No knowledge base found at {}", INFO, path.display());
        println!("Run `campuslens build` to create it.");
        return Ok(());
    }

    let store = open_store(config).await?;
    let collections = store.list_collections().await?;
    let active = collections
        .iter()
        .find(|c| c.alias.as_deref() == Some(config.store.collection.as_str()));

    let Some(info) = active else {
        println!(
            "{}Collection {} has not been built yet.",
            INFO,
            style(&config.store.collection).yellow()
        );
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(info)?);
        return Ok(());
    }

    println!("\n{}Knowledge base: {}\n", INFO, style(path.display()).dim());
    println!("  Collection:      {}", style(&config.store.collection).green());
    println!("  Documents:       {}", style(info.document_count).cyan());
    for (doc_type, count) in &info.counts_by_type {
        println!("    {:<15} {}", doc_type, count);
    }
    match (&info.meta.embedding_model, info.meta.dimension) {
        (Some(model), Some(dimension)) => {
            println!("  Embedding model: {} ({} dimensions)", style(model).cyan(), dimension)
        }
        _ => println!("  Embedding model: {}", style("none").yellow()),
    }
    println!("  Fingerprint:     {}", style(&info.meta.fingerprint).dim());
    if let Some(built_at) = info.meta.built_at {
        println!(
            "  Built at:        {}",
            style(built_at.format("%Y-%m-%d %H:%M:%S")).dim()
        );
    }

    Ok(())
}
