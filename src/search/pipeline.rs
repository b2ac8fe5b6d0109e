//! Question answering over a built collection: retrieve, rerank, bound.
//!
//! The capability tier is decided once, when the [`PipelineContext`] is
//! created. A model-mode pipeline still degrades per request when the question
//! cannot be embedded or the reranker misbehaves; those failures are logged and
//! never returned to the caller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::SearchConfig;
use crate::error::{Error, Result};

use super::embedder::Embedder;
use super::fallback;
use super::reranker::Reranker;
use super::store::{CollectionMeta, DocFilter, DocType, Document, SearchResult, VectorStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Embedding retrieval followed by cross-encoder rerank
    Model,
    /// Lexical overlap only
    Fallback,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Model => write!(f, "model"),
            Mode::Fallback => write!(f, "fallback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub question: String,
    pub top_k_retrieve: usize,
    pub top_k_final: usize,
    pub doc_type: Option<DocType>,
}

impl Query {
    pub fn new(question: impl Into<String>) -> Self {
        let defaults = SearchConfig::default();
        Self {
            question: question.into(),
            top_k_retrieve: defaults.top_k_retrieve,
            top_k_final: defaults.top_k_final,
            doc_type: None,
        }
    }

    pub fn top_k(mut self, retrieve: usize, keep: usize) -> Self {
        self.top_k_retrieve = retrieve;
        self.top_k_final = keep;
        self
    }

    pub fn doc_type(mut self, doc_type: DocType) -> Self {
        self.doc_type = Some(doc_type);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.question.trim().is_empty() {
            return Err(Error::InvalidQuery("question is empty".to_string()));
        }
        if self.top_k_retrieve == 0 {
            return Err(Error::InvalidQuery(
                "top_k_retrieve must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedResult {
    pub question: String,
    pub answer: String,
    pub mode: Mode,
    pub documents: Vec<Document>,
    /// Parallel to `documents`, non-increasing
    pub scores: Vec<f32>,
}

/// Resolved capability tier and handles, shared by every query.
pub struct PipelineContext {
    store: Arc<dyn VectorStore>,
    collection: String,
    embedder: Option<Arc<dyn Embedder>>,
    reranker: Option<Arc<dyn Reranker>>,
    mode: Mode,
    defaults: SearchConfig,
}

impl PipelineContext {
    /// Health-check both providers and fix the mode. Model mode needs both healthy.
    pub async fn initialize(
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        embedder: Option<Arc<dyn Embedder>>,
        reranker: Option<Arc<dyn Reranker>>,
        defaults: SearchConfig,
    ) -> Self {
        let collection = collection.into();

        let (embedder, reranker) = match (embedder, reranker) {
            (Some(embedder), Some(reranker)) => {
                let (embed_health, rerank_health) =
                    tokio::join!(embedder.health_check(), reranker.health_check());

                match (embed_health, rerank_health) {
                    (Ok(()), Ok(())) => (Some(embedder), Some(reranker)),
                    (embed_health, rerank_health) => {
                        for (provider, err) in [("embedder", embed_health.err()), ("reranker", rerank_health.err())] {
                            if let Some(err) = err {
                                let degraded = Error::ProviderDegraded(format!("{}: {:#}", provider, err));
                                warn!(error = %degraded, "Provider unavailable");
                            }
                        }
                        (None, None)
                    }
                }
            }
            (embedder, reranker) => {
                let missing = if embedder.is_none() { "embedder" } else { "reranker" };
                let degraded = Error::ProviderDegraded(format!("{} not configured", missing));
                warn!(error = %degraded, "Provider unavailable");
                (None, None)
            }
        };

        let mode = if embedder.is_some() {
            Mode::Model
        } else {
            Mode::Fallback
        };
        info!(collection = %collection, mode = %mode, "Query pipeline ready");

        Self {
            store,
            collection,
            embedder,
            reranker,
            mode,
            defaults,
        }
    }

    /// Lexical-only context; no provider is health-checked.
    pub fn fallback(
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        defaults: SearchConfig,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            embedder: None,
            reranker: None,
            mode: Mode::Fallback,
            defaults,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn defaults(&self) -> &SearchConfig {
        &self.defaults
    }
}

/// Cheap to clone; clones share one [`PipelineContext`].
#[derive(Clone)]
pub struct QueryPipeline {
    ctx: Arc<PipelineContext>,
}

impl QueryPipeline {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    pub fn mode(&self) -> Mode {
        self.ctx.mode
    }

    /// Query with the context's default sizes.
    pub async fn ask(&self, question: &str) -> Result<RankedResult> {
        let query = Query::new(question).top_k(
            self.ctx.defaults.top_k_retrieve,
            self.ctx.defaults.top_k_final,
        );
        self.query(&query).await
    }

    pub async fn query(&self, query: &Query) -> Result<RankedResult> {
        query.validate()?;

        let filter = query.doc_type.clone().map(DocFilter::by_type);
        let (mut candidates, by_vector) = self.retrieve(query, filter.as_ref()).await?;
        let retrieved = candidates.len();
        debug!(candidates = retrieved, by_vector, "Retrieval done");

        if by_vector {
            if let Some(reranker) = &self.ctx.reranker {
                candidates = rerank(reranker.as_ref(), &query.question, candidates).await;
            }
        }

        let results = if query.top_k_final == 0 {
            Vec::new()
        } else if retrieved == 0 {
            vec![SearchResult::new(Document::placeholder(), 0.0)]
        } else {
            candidates.truncate(query.top_k_final);
            candidates
        };

        let found = results.iter().filter(|r| !r.document.is_placeholder()).count();
        let (documents, scores): (Vec<Document>, Vec<f32>) =
            results.into_iter().map(|r| (r.document, r.score)).unzip();

        Ok(RankedResult {
            question: query.question.clone(),
            answer: format!("Found {} relevant passage(s) in the knowledge base", found),
            mode: self.ctx.mode,
            documents,
            scores,
        })
    }

    /// Candidates and whether they came from vector search. The whole request
    /// reads one snapshot of the collection.
    async fn retrieve(
        &self,
        query: &Query,
        filter: Option<&DocFilter>,
    ) -> Result<(Vec<SearchResult>, bool)> {
        let snapshot = self
            .ctx
            .store
            .snapshot(&self.ctx.collection)
            .await
            .map_err(Error::storage)?;

        if let Some(embedder) = &self.ctx.embedder {
            if let Some(vector) = self.embed_question(embedder.as_ref(), query, &snapshot.meta).await {
                let results = snapshot.search(&vector, query.top_k_retrieve, filter);
                return Ok((results, true));
            }
        }

        Ok((
            fallback::rank(&query.question, &snapshot.documents, filter, query.top_k_retrieve),
            false,
        ))
    }

    /// `None` when this request has to fall back to lexical retrieval.
    async fn embed_question(
        &self,
        embedder: &dyn Embedder,
        query: &Query,
        meta: &CollectionMeta,
    ) -> Option<Vec<f32>> {
        let Some(dimension) = meta.dimension else {
            debug!(collection = %self.ctx.collection, "Collection has no embeddings");
            return None;
        };

        match embedder.embed(&query.question).await {
            Ok(vector) if vector.len() == dimension => Some(vector),
            Ok(vector) => {
                let degraded = Error::ProviderDegraded(format!(
                    "question embedding has {} dimensions, collection has {}",
                    vector.len(),
                    dimension
                ));
                warn!(error = %degraded, "Falling back to lexical retrieval");
                None
            }
            Err(e) => {
                let degraded = Error::ProviderDegraded(format!("embedding failed: {:#}", e));
                warn!(error = %degraded, "Falling back to lexical retrieval");
                None
            }
        }
    }
}

/// Reorder by cross-encoder score. Any failure keeps the retrieval order and scores.
async fn rerank(
    reranker: &dyn Reranker,
    question: &str,
    candidates: Vec<SearchResult>,
) -> Vec<SearchResult> {
    if candidates.is_empty() {
        return candidates;
    }

    let texts: Vec<String> = candidates.iter().map(|c| c.document.text.clone()).collect();
    let scores = match reranker.score_batch(question, &texts).await {
        Ok(scores) if scores.len() == candidates.len() && scores.iter().all(|s| s.is_finite()) => {
            scores
        }
        Ok(_) => {
            let degraded = Error::ProviderDegraded("reranker returned unusable scores".to_string());
            warn!(error = %degraded, "Keeping retrieval order");
            return candidates;
        }
        Err(e) => {
            let degraded = Error::ProviderDegraded(format!("rerank failed: {:#}", e));
            warn!(error = %degraded, "Keeping retrieval order");
            return candidates;
        }
    };

    let mut reranked: Vec<SearchResult> = candidates
        .into_iter()
        .zip(scores)
        .map(|(c, score)| SearchResult::new(c.document, score))
        .collect();

    reranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    reranked
}
