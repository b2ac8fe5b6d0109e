use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::Reranker;

/// Client for a text-embeddings-inference style `/rerank` endpoint.
pub struct HttpReranker {
    endpoint: String,
    model: String,
    client: Client,
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    texts: &'a [String],
    truncate: bool,
}

#[derive(Deserialize)]
struct RerankHit {
    index: usize,
    score: f32,
}

impl HttpReranker {
    pub fn new(endpoint: &str, model: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Put scores back into input order. Every input must be scored exactly once.
fn order_scores(hits: Vec<RerankHit>, expected: usize) -> Result<Vec<f32>> {
    let mut scores = vec![None; expected];
    for hit in hits {
        let slot = scores
            .get_mut(hit.index)
            .ok_or_else(|| anyhow!("Reranker returned out-of-range index {}", hit.index))?;
        *slot = Some(hit.score);
    }
    scores
        .into_iter()
        .enumerate()
        .map(|(i, s)| s.ok_or_else(|| anyhow!("Reranker returned no score for candidate {}", i)))
        .collect()
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn score(&self, query: &str, candidate: &str) -> Result<f32> {
        let scores = self.score_batch(query, &[candidate.to_string()]).await?;
        scores
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No rerank score returned"))
    }

    async fn score_batch(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let request = RerankRequest {
            query,
            texts: candidates,
            truncate: true,
        };

        let response = self
            .client
            .post(format!("{}/rerank", self.endpoint))
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow!("Rerank request to {} failed: {}", self.endpoint, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Reranker error ({}): {}", status, body));
        }

        let hits: Vec<RerankHit> = response.json().await?;
        order_scores(hits, candidates.len())
    }

    async fn health_check(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/health", self.endpoint))
            .send()
            .await
            .map_err(|_| anyhow!("Cannot connect to reranker at {}", self.endpoint))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Reranker health check failed ({}) for model '{}'",
                response.status(),
                self.model
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(index: usize, score: f32) -> RerankHit {
        RerankHit { index, score }
    }

    #[test]
    fn test_order_scores_restores_input_order() {
        // the server sorts by score, not by index
        let scores = order_scores(vec![hit(2, 0.9), hit(0, 0.5), hit(1, 0.1)], 3).unwrap();
        assert_eq!(scores, vec![0.5, 0.1, 0.9]);
    }

    #[test]
    fn test_order_scores_missing_or_out_of_range() {
        assert!(order_scores(vec![hit(0, 0.5)], 2).is_err());
        assert!(order_scores(vec![hit(0, 0.5), hit(3, 0.1)], 2).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let reranker = HttpReranker::new("http://127.0.0.1:9/", "bge-reranker", 2).unwrap();
        assert_eq!(reranker.endpoint, "http://127.0.0.1:9");
        assert!(reranker.health_check().await.is_err());
        assert!(reranker.score("q", "doc").await.is_err());
    }
}
