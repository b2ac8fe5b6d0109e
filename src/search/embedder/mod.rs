mod ollama;

pub use ollama::OllamaEmbedder;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Bi-encoder: maps text to a fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    fn dimensions(&self) -> usize;
    /// Model identifier recorded on collections built with this embedder.
    fn model(&self) -> &str;
    async fn health_check(&self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedderConfig {
    pub enabled: bool,
    pub provider: String,
    pub model: String,
    pub endpoint: Option<String>,
    pub dimensions: usize,
    pub timeout_secs: u64,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: "ollama".to_string(),
            model: "bge-m3".to_string(),
            endpoint: None,
            dimensions: 1024,
            timeout_secs: 120,
        }
    }
}

pub fn create_embedder(config: &EmbedderConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "ollama" => {
            let endpoint = config
                .endpoint
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string());
            Ok(Arc::new(OllamaEmbedder::new(
                &endpoint,
                &config.model,
                config.dimensions,
                config.timeout_secs,
            )?))
        }
        other => bail!("Unknown embedding provider '{}'", other),
    }
}
