mod file;
mod types;

pub use file::FileStore;
pub use types::{
    AttributeValue, Attributes, Collection, CollectionInfo, CollectionMeta, DocFilter, DocType, Document,
    SearchResult, PLACEHOLDER_ID, PLACEHOLDER_TEXT,
};

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Named collections of documents with nearest-neighbour lookup.
///
/// Every read accepts either a physical collection name or an alias; aliases
/// resolve to the collection they currently point at.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create an empty collection, replacing any collection of the same name.
    async fn create_collection(&self, collection: &str, meta: CollectionMeta) -> Result<()>;
    async fn upsert(&self, collection: &str, documents: Vec<Document>) -> Result<()>;
    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
        filter: Option<&DocFilter>,
    ) -> Result<Vec<SearchResult>>;
    /// The collection as it is right now; later alias swaps do not affect it.
    async fn snapshot(&self, collection: &str) -> Result<Arc<Collection>>;
    /// All documents of a collection in insertion order.
    async fn documents(&self, collection: &str) -> Result<Vec<Document>>;
    async fn delete_collection(&self, collection: &str) -> Result<()>;
    async fn count(&self, collection: &str) -> Result<usize>;
    async fn meta(&self, collection: &str) -> Result<CollectionMeta>;
    /// Atomically point `alias` at `collection`, returning the previous target.
    async fn promote(&self, alias: &str, collection: &str) -> Result<Option<String>>;
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>>;
    async fn persist(&self) -> Result<()>;
    async fn load(&self) -> Result<()>;
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_dimension_mismatch() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_cosine_similarity_empty() {
        let a: Vec<f32> = vec![];
        let b: Vec<f32> = vec![];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }
}
