use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "campuslens",
    version,
    about = "Question answering over graduate records and curriculum plans"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Config file (defaults to ./campuslens.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging for campuslens (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the knowledge base from the configured sources
    Build {
        /// Skip the embedding provider and build a lexical-only collection
        #[arg(long)]
        fallback: bool,

        /// Print the build report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Ask a question against the knowledge base
    Query {
        question: String,

        /// Candidates kept after retrieval
        #[arg(long)]
        top_k_retrieve: Option<usize>,

        /// Passages returned
        #[arg(long)]
        top_k_final: Option<usize>,

        /// Restrict to one document type (graduate, curriculum_section, ...)
        #[arg(long = "type", value_name = "TYPE")]
        doc_type: Option<String>,

        /// Print the ranked result as JSON
        #[arg(long)]
        json: bool,

        /// Lexical scoring only; no provider is contacted
        #[arg(long)]
        fallback: bool,
    },

    /// Show the active collection and its statistics
    Status {
        #[arg(long)]
        json: bool,
    },
}
