use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const PLACEHOLDER_ID: &str = "placeholder";
pub const PLACEHOLDER_TEXT: &str = "No relevant information found";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    Graduate,
    CurriculumSection,
    Custom(String),
}

impl DocType {
    pub fn as_str(&self) -> &str {
        match self {
            DocType::Graduate => "graduate",
            DocType::CurriculumSection => "curriculum_section",
            DocType::Custom(name) => name,
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "graduate" => DocType::Graduate,
            "curriculum_section" | "cultivation_plan" => DocType::CurriculumSection,
            other => DocType::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Number(f64),
    Text(String),
}

impl AttributeValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            AttributeValue::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            AttributeValue::Text(_) => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Number(n) => write!(f, "{}", n),
            AttributeValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<usize> for AttributeValue {
    fn from(value: usize) -> Self {
        AttributeValue::Number(value as f64)
    }
}

pub type Attributes = BTreeMap<String, AttributeValue>;

/// A retrievable unit of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub doc_type: DocType,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>, doc_type: DocType) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            doc_type,
            attributes: Attributes::new(),
            embedding: None,
        }
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// Stand-in returned when retrieval found nothing at all.
    pub fn placeholder() -> Self {
        Self::new(
            PLACEHOLDER_ID,
            PLACEHOLDER_TEXT,
            DocType::Custom(PLACEHOLDER_ID.to_string()),
        )
    }

    pub fn is_placeholder(&self) -> bool {
        self.id == PLACEHOLDER_ID && self.text == PLACEHOLDER_TEXT
    }
}

/// Metadata filter applied during nearest-neighbour queries and fallback scans.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocFilter {
    pub doc_type: Option<DocType>,
}

impl DocFilter {
    pub fn by_type(doc_type: DocType) -> Self {
        Self {
            doc_type: Some(doc_type),
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match &self.doc_type {
            Some(t) => &doc.doc_type == t,
            None => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub document: Document,
    pub score: f32,
}

impl SearchResult {
    pub fn new(document: Document, score: f32) -> Self {
        Self { document, score }
    }
}

/// Provider metadata recorded with a collection at build time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionMeta {
    pub embedding_model: Option<String>,
    pub dimension: Option<usize>,
    pub fingerprint: String,
    pub built_at: Option<DateTime<Utc>>,
}

impl CollectionMeta {
    pub fn is_embedded(&self) -> bool {
        self.dimension.is_some()
    }
}

/// One physical collection. Readers hold it behind an `Arc`, so a snapshot
/// stays whole while a rebuild swaps the alias.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Collection {
    pub meta: CollectionMeta,
    pub documents: Vec<Document>,
}

impl Collection {
    /// Nearest embedded documents by cosine similarity, best first.
    pub fn search(&self, vector: &[f32], k: usize, filter: Option<&DocFilter>) -> Vec<SearchResult> {
        let mut results: Vec<SearchResult> = self
            .documents
            .iter()
            .filter(|doc| filter.map_or(true, |f| f.matches(doc)))
            .filter_map(|doc| {
                let embedding = doc.embedding.as_ref()?;
                let score = super::cosine_similarity(vector, embedding);
                Some(SearchResult::new(doc.clone(), score))
            })
            .collect();

        // stable: equal scores keep insertion order
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(k);
        results
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    /// Alias currently pointing at this collection, if any.
    pub alias: Option<String>,
    pub document_count: usize,
    pub counts_by_type: BTreeMap<String, usize>,
    pub meta: CollectionMeta,
}
