pub mod builder;
pub mod chunker;
pub mod embedder;
pub mod fallback;
pub mod pipeline;
pub mod reranker;
pub mod source;
pub mod store;

pub use builder::{BuildReport, KnowledgeBaseBuilder, SourceWarning};
pub use chunker::{Chunk, CurriculumChunker, RecordChunker, RecordSchema, SectionChunker};
pub use embedder::{create_embedder, Embedder, EmbedderConfig};
pub use pipeline::{Mode, PipelineContext, Query, QueryPipeline, RankedResult};
pub use reranker::{create_reranker, Reranker, RerankerConfig};
pub use source::{Source, SourceFormat, SourceOrigin};
pub use store::{
    CollectionInfo, CollectionMeta, DocFilter, DocType, Document, FileStore, SearchResult,
    VectorStore,
};
