mod http;

pub use http::HttpReranker;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Cross-encoder: scores a (query, candidate) pair jointly. Higher is more relevant.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn score(&self, query: &str, candidate: &str) -> Result<f32>;

    /// Scores in the same order as `candidates`.
    async fn score_batch(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>> {
        let mut scores = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            scores.push(self.score(query, candidate).await?);
        }
        Ok(scores)
    }

    async fn health_check(&self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankerConfig {
    pub enabled: bool,
    pub provider: String,
    pub model: String,
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: "http".to_string(),
            model: "BAAI/bge-reranker-v2-m3".to_string(),
            endpoint: None,
            timeout_secs: 60,
        }
    }
}

pub fn create_reranker(config: &RerankerConfig) -> Result<Arc<dyn Reranker>> {
    match config.provider.as_str() {
        "http" | "tei" => {
            let endpoint = config
                .endpoint
                .clone()
                .unwrap_or_else(|| "http://localhost:8080".to_string());
            Ok(Arc::new(HttpReranker::new(
                &endpoint,
                &config.model,
                config.timeout_secs,
            )?))
        }
        other => bail!("Unknown reranking provider '{}'", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct LengthReranker;

    #[async_trait]
    impl Reranker for LengthReranker {
        async fn score(&self, _query: &str, candidate: &str) -> Result<f32> {
            if candidate.is_empty() {
                return Err(anyhow!("empty candidate"));
            }
            Ok(candidate.chars().count() as f32)
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_default_score_batch_keeps_order() {
        let candidates = vec!["ab".to_string(), "a".to_string(), "abc".to_string()];
        let scores = LengthReranker.score_batch("q", &candidates).await.unwrap();
        assert_eq!(scores, vec![2.0, 1.0, 3.0]);
    }

    #[tokio::test]
    async fn test_default_score_batch_propagates_error() {
        let candidates = vec!["ab".to_string(), String::new()];
        assert!(LengthReranker.score_batch("q", &candidates).await.is_err());
    }

    #[test]
    fn test_create_reranker() {
        assert!(create_reranker(&RerankerConfig::default()).is_ok());

        let config = RerankerConfig {
            provider: "local".to_string(),
            ..Default::default()
        };
        assert!(create_reranker(&config).is_err());
    }
}
