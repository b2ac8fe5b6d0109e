use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use campuslens::cli::{self, Args, Command, QueryOptions};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        "campuslens=debug"
    } else {
        "campuslens=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli::load_config(args.config.as_deref())?;

    match args.command {
        Command::Build { fallback, json } => cli::run_build(&config, fallback, json).await,
        Command::Query {
            question,
            top_k_retrieve,
            top_k_final,
            doc_type,
            json,
            fallback,
        } => {
            let options = QueryOptions {
                top_k_retrieve,
                top_k_final,
                doc_type,
                json,
                fallback,
            };
            cli::run_query(&config, &question, options).await
        }
        Command::Status { json } => cli::run_status(&config, json).await,
    }
}
