//! Retrieval-and-rerank question answering over graduate records and
//! curriculum plans.
//!
//! [`search::KnowledgeBaseBuilder`] turns sources into a collection;
//! [`search::QueryPipeline`] answers questions against it, with an embedding
//! model and a cross-encoder when both are reachable and lexical overlap
//! otherwise.

pub mod cli;
pub mod config;
pub mod error;
pub mod search;

pub use config::Config;
pub use error::{Error, Result};
