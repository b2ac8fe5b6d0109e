use thiserror::Error;

/// Failures surfaced by the knowledge base builder and the query pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Rejected before any provider or store call was made.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The build produced zero documents; the previous collection is untouched.
    #[error("knowledge base is empty: no documents were produced from the given sources")]
    EmptyKnowledgeBase,

    #[error("vector store unavailable: {0}")]
    StorageUnavailable(String),

    /// A provider tier was lost. Logged, never returned from `build` or `query`.
    #[error("provider degraded: {0}")]
    ProviderDegraded(String),
}

impl Error {
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Error::StorageUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
