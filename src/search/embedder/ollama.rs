use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::Embedder;

pub struct OllamaEmbedder {
    endpoint: String,
    model: String,
    dimensions: usize,
    client: Client,
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
    truncate: bool,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

impl OllamaEmbedder {
    pub fn new(endpoint: &str, model: &str, dimensions: usize, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dimensions,
            client,
        })
    }

    fn unreachable(&self) -> anyhow::Error {
        anyhow!(
            "Cannot connect to Ollama at {}. Is it running? Start it with: ollama serve",
            self.endpoint
        )
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No embedding returned"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
            truncate: true,
        };

        let response = self
            .client
            .post(format!("{}/api/embed", self.endpoint))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    self.unreachable()
                } else {
                    anyhow!("Ollama request failed: {}", e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 404 || body.contains("not found") {
                return Err(anyhow!(
                    "Model '{}' not found. Pull it with:\n  ollama pull {}",
                    self.model,
                    self.model
                ));
            }

            return Err(anyhow!("Ollama error ({}): {}", status, body));
        }

        let embed_response: EmbedResponse = response.json().await?;
        if embed_response.embeddings.len() != texts.len() {
            return Err(anyhow!(
                "Ollama returned {} embeddings for {} inputs",
                embed_response.embeddings.len(),
                texts.len()
            ));
        }
        if let Some(bad) = embed_response
            .embeddings
            .iter()
            .find(|v| v.len() != self.dimensions)
        {
            return Err(anyhow!(
                "Model '{}' produced {} dimensions, expected {}",
                self.model,
                bad.len(),
                self.dimensions
            ));
        }
        Ok(embed_response.embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.endpoint))
            .send()
            .await
            .map_err(|_| self.unreachable())?;

        if !response.status().is_success() {
            return Err(anyhow!("Ollama health check failed"));
        }

        let tags: OllamaTagsResponse = response.json().await?;
        let model_available = tags
            .models
            .iter()
            .any(|m| m.name.starts_with(&self.model) || m.name == format!("{}:latest", self.model));

        if !model_available {
            return Err(anyhow!(
                "Model '{}' not installed. Pull it with:\n  ollama pull {}",
                self.model,
                self.model
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trailing_slash() {
        let embedder = OllamaEmbedder::new("http://localhost:11434/", "bge-m3", 1024, 5).unwrap();
        assert_eq!(embedder.endpoint, "http://localhost:11434");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let embedder = OllamaEmbedder::new("http://127.0.0.1:9", "bge-m3", 1024, 2).unwrap();
        assert!(embedder.health_check().await.is_err());
        assert!(embedder.embed("计算机").await.is_err());
    }

    #[tokio::test]
    async fn test_empty_batch_skips_request() {
        let embedder = OllamaEmbedder::new("http://127.0.0.1:9", "bge-m3", 1024, 2).unwrap();
        assert!(embedder.embed_batch(&[]).await.unwrap().is_empty());
    }
}
