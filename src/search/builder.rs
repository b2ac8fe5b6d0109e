use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};

use super::chunker::{Chunk, CurriculumChunker, RecordChunker, RecordSchema, SectionChunker};
use super::embedder::Embedder;
use super::source::{Source, SourceContent, SourceFormat};
use super::store::{AttributeValue, CollectionMeta, DocType, Document, VectorStore};

const EMBED_BATCH_SIZE: usize = 32;

/// A source (or the embedder) that was skipped during a build.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceWarning {
    pub source: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub collection: String,
    pub document_count: usize,
    pub counts_by_type: BTreeMap<String, usize>,
    /// `None` when the collection was built without embeddings
    pub dimension: Option<usize>,
    pub fingerprint: String,
    pub warnings: Vec<SourceWarning>,
}

/// Turns sources into a collection and publishes it under an alias.
///
/// Publishing is copy-on-write: documents go into a fresh staging collection
/// that replaces the live one in a single alias swap, so readers see either the
/// old or the new collection and never a partial one.
pub struct KnowledgeBaseBuilder {
    store: Arc<dyn VectorStore>,
    embedder: Option<Arc<dyn Embedder>>,
    sections: SectionChunker,
    curriculum: CurriculumChunker,
    lock: Mutex<()>,
}

impl KnowledgeBaseBuilder {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Option<Arc<dyn Embedder>>,
        config: &ChunkingConfig,
    ) -> anyhow::Result<Self> {
        let sections = SectionChunker::new(&config.section_headers, config.min_section_chars)?;
        let curriculum = CurriculumChunker::new(&config.major_heading, sections.clone())?;

        Ok(Self {
            store,
            embedder,
            sections,
            curriculum,
            lock: Mutex::new(()),
        })
    }

    /// Build `collection` from `sources`, replacing what it pointed at before.
    ///
    /// Fails with [`Error::EmptyKnowledgeBase`] when no source yields a
    /// document; the store is left untouched in that case.
    pub async fn build(&self, collection: &str, sources: &[Source]) -> Result<BuildReport> {
        let _guard = self.lock.lock().await;

        let mut warnings = Vec::new();
        let mut documents = Vec::new();

        for source in sources {
            match self.chunk_source(source) {
                Ok(chunks) => {
                    debug!(source = %source.id, chunks = chunks.len(), "Chunked source");
                    for chunk in chunks {
                        let id = format!("doc_{}", documents.len());
                        documents.push(into_document(id, chunk, &source.id));
                    }
                }
                Err(e) => {
                    warn!(source = %source.id, error = %e, "Skipping source");
                    warnings.push(SourceWarning {
                        source: source.id.clone(),
                        message: format!("{:#}", e),
                    });
                }
            }
        }

        if documents.is_empty() {
            return Err(Error::EmptyKnowledgeBase);
        }

        let mut meta = CollectionMeta {
            embedding_model: None,
            dimension: None,
            fingerprint: fingerprint(&documents),
            built_at: Some(Utc::now()),
        };

        if let Some(embedder) = &self.embedder {
            match embed_documents(embedder.as_ref(), &mut documents).await {
                Ok(()) => {
                    meta.embedding_model = Some(embedder.model().to_string());
                    meta.dimension = Some(embedder.dimensions());
                }
                Err(e) => {
                    let degraded = Error::ProviderDegraded(format!("embedding failed: {:#}", e));
                    warn!(error = %degraded, "Building collection without embeddings");
                    for doc in &mut documents {
                        doc.embedding = None;
                    }
                    warnings.push(SourceWarning {
                        source: format!("embedder:{}", embedder.model()),
                        message: degraded.to_string(),
                    });
                }
            }
        }

        let mut counts_by_type = BTreeMap::new();
        for doc in &documents {
            *counts_by_type
                .entry(doc.doc_type.as_str().to_string())
                .or_insert(0) += 1;
        }

        let report = BuildReport {
            collection: collection.to_string(),
            document_count: documents.len(),
            counts_by_type,
            dimension: meta.dimension,
            fingerprint: meta.fingerprint.clone(),
            warnings,
        };

        self.publish(collection, meta, documents).await?;

        info!(
            collection,
            documents = report.document_count,
            embedded = report.dimension.is_some(),
            "Knowledge base built"
        );

        Ok(report)
    }

    /// Load, decode and chunk one source.
    pub fn chunk_source(&self, source: &Source) -> anyhow::Result<Vec<Chunk>> {
        let chunks = match (source.format, source.load()?) {
            (_, SourceContent::Table(table)) => {
                let schema = match source.doc_type {
                    DocType::Graduate => RecordSchema::graduate(),
                    _ => RecordSchema::from_columns(source.doc_type.clone(), &table.columns),
                };
                RecordChunker::new(schema).chunk(&table.rows)
            }
            (SourceFormat::Curriculum, SourceContent::Text(text)) => {
                self.curriculum.chunk(&text, &source.id)
            }
            (_, SourceContent::Text(text)) => self.sections.chunk_as(&text, &source.doc_type),
        };

        Ok(chunks
            .into_iter()
            .filter(|c| !c.text.trim().is_empty())
            .collect())
    }

    async fn publish(
        &self,
        collection: &str,
        meta: CollectionMeta,
        documents: Vec<Document>,
    ) -> Result<()> {
        let staging = format!("{}@{}", collection, Uuid::new_v4());

        self.store
            .create_collection(&staging, meta)
            .await
            .map_err(Error::storage)?;

        let swapped = match self.store.upsert(&staging, documents).await {
            Ok(()) => self.store.promote(collection, &staging).await,
            Err(e) => Err(e),
        };

        let previous = match swapped {
            Ok(previous) => previous,
            Err(e) => {
                self.roll_back(collection, &staging, None).await;
                return Err(Error::storage(e));
            }
        };

        // the build only counts once it is on disk
        if let Err(e) = self.store.persist().await {
            self.roll_back(collection, &staging, previous.as_deref()).await;
            return Err(Error::storage(e));
        }

        if let Some(previous) = previous {
            debug!(previous = %previous, "Dropping replaced collection");
            if let Err(e) = self.store.delete_collection(&previous).await {
                warn!(previous = %previous, error = %e, "Failed to remove replaced collection");
            } else if let Err(e) = self.store.persist().await {
                warn!(previous = %previous, error = %e, "Replaced collection still on disk");
            }
        }

        Ok(())
    }

    /// Point `collection` back at `previous` and drop the staging collection.
    async fn roll_back(&self, collection: &str, staging: &str, previous: Option<&str>) {
        if let Some(previous) = previous {
            if let Err(e) = self.store.promote(collection, previous).await {
                warn!(previous = %previous, error = %e, "Failed to restore previous collection");
            }
        }
        // also drops the alias when nothing was live before
        if let Err(e) = self.store.delete_collection(staging).await {
            warn!(staging = %staging, error = %e, "Failed to remove staging collection");
        }
    }
}

fn into_document(id: String, chunk: Chunk, source_id: &str) -> Document {
    let mut document = Document::new(id, chunk.text, chunk.doc_type);
    document.attributes = chunk.attributes;
    document
        .attributes
        .insert("source".to_string(), AttributeValue::from(source_id));
    document
}

async fn embed_documents(embedder: &dyn Embedder, documents: &mut [Document]) -> anyhow::Result<()> {
    for batch in documents.chunks_mut(EMBED_BATCH_SIZE) {
        let texts: Vec<String> = batch.iter().map(|d| d.text.clone()).collect();
        let embeddings = embedder.embed_batch(&texts).await?;

        if embeddings.len() != batch.len() {
            anyhow::bail!(
                "embedder returned {} vectors for {} documents",
                embeddings.len(),
                batch.len()
            );
        }

        for (doc, vector) in batch.iter_mut().zip(embeddings) {
            doc.embedding = Some(vector);
        }
    }

    Ok(())
}

/// Content fingerprint over document texts in order.
fn fingerprint(documents: &[Document]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    for doc in documents {
        hasher.update(doc.text.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())[..16].to_string()
}
