use anyhow::Result;
use console::{style, Emoji};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;

use crate::config::Config;
use crate::error::Error;
use crate::search::{create_embedder, Embedder, KnowledgeBaseBuilder};

use super::open_store;

static BUILDING: Emoji<'_, '_> = Emoji("📚 ", "");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "");
static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "");
static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "");

pub async fn run_build(config: &Config, fallback: bool, json: bool) -> Result<()> {
    let sources = config.sources()?;
    if sources.is_empty() {
        anyhow::bail!("No sources configured. Add [[sources]] entries to campuslens.toml.");
    }

    let embedder = if fallback || !config.embedder.enabled {
        None
    } else {
        checked_embedder(config, json).await?
    };

    let store = open_store(config).await?;
    let builder = KnowledgeBaseBuilder::new(store, embedder, &config.chunking)?;

    let pb = ProgressBar::new_spinner();
    if !json {
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!(
            "{}Building {} from {} source(s)...",
            BUILDING,
            config.store.collection,
            sources.len()
        ));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
    }

    let result = builder.build(&config.store.collection, &sources).await;
    pb.finish_and_clear();

    let report = match result {
        Ok(report) => report,
        Err(Error::EmptyKnowledgeBase) => {
            anyhow::bail!("No documents were produced; the existing knowledge base was kept.")
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("\n{}Knowledge base built!\n", SUCCESS);
    println!("  Collection:      {}", style(&report.collection).green());
    println!("  Documents:       {}", style(report.document_count).cyan());
    for (doc_type, count) in &report.counts_by_type {
        println!("    {:<15} {}", doc_type, count);
    }
    match report.dimension {
        Some(dimension) => println!("  Embeddings:      {} dimensions", style(dimension).cyan()),
        None => println!("  Embeddings:      {}", style("none (lexical search only)").yellow()),
    }
    println!("  Fingerprint:     {}", style(&report.fingerprint).dim());

    if !report.warnings.is_empty() {
        println!("\n{}Warnings ({}):", WARN, report.warnings.len());
        for warning in &report.warnings {
            println!(
                "  - {}: {}",
                style(&warning.source).yellow(),
                style(&warning.message).red()
            );
        }
    }

    Ok(())
}

/// The embedder when it answers its health check, otherwise `None`.
async fn checked_embedder(config: &Config, quiet: bool) -> Result<Option<Arc<dyn Embedder>>> {
    let embedder = create_embedder(&config.embedder)?;
    match embedder.health_check().await {
        Ok(()) => Ok(Some(embedder)),
        Err(e) => {
            tracing::warn!(error = %e, "Embedding provider unavailable");
            if !quiet {
                println!(
                    "{}Embedding provider unavailable, building without embeddings:\n  {}",
                    INFO,
                    style(format!("{:#}", e)).dim()
                );
            }
            Ok(None)
        }
    }
}
