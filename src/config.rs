use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::search::chunker::{DEFAULT_MAJOR_HEADING, DEFAULT_MIN_SECTION_CHARS, DEFAULT_SECTION_HEADERS};
use crate::search::{DocType, EmbedderConfig, RerankerConfig, Source, SourceFormat, SourceOrigin};

pub const CONFIG_FILE: &str = "campuslens.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub embedder: EmbedderConfig,
    #[serde(default)]
    pub reranker: RerankerConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".campuslens/index.json")
}

fn default_collection() -> String {
    "student_knowledge".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            collection: default_collection(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Sections shorter than this many characters are not indexed
    #[serde(default = "default_min_section_chars")]
    pub min_section_chars: usize,
    /// Regexes for section headers, matched anywhere in the text
    #[serde(default = "default_section_headers")]
    pub section_headers: Vec<String>,
    /// Regex for a major's heading in a combined plan file; group 1 is the name
    #[serde(default = "default_major_heading")]
    pub major_heading: String,
}

fn default_min_section_chars() -> usize {
    DEFAULT_MIN_SECTION_CHARS
}

fn default_section_headers() -> Vec<String> {
    DEFAULT_SECTION_HEADERS.iter().map(|h| h.to_string()).collect()
}

fn default_major_heading() -> String {
    DEFAULT_MAJOR_HEADING.into()
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            min_section_chars: default_min_section_chars(),
            section_headers: default_section_headers(),
            major_heading: default_major_heading(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_top_k_retrieve")]
    pub top_k_retrieve: usize,
    #[serde(default = "default_top_k_final")]
    pub top_k_final: usize,
}

fn default_top_k_retrieve() -> usize {
    20
}

fn default_top_k_final() -> usize {
    5
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k_retrieve: default_top_k_retrieve(),
            top_k_final: default_top_k_final(),
        }
    }
}

/// One `[[sources]]` entry. Exactly one of `path` and `content` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub format: SourceFormat,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub content: Option<String>,
}

impl SourceConfig {
    /// Relative paths are taken from `base`, the directory holding the config file.
    pub fn to_source(&self, base: &Path) -> Result<Source> {
        let origin = match (&self.path, &self.content) {
            (Some(path), None) if path.is_absolute() => SourceOrigin::Path(path.clone()),
            (Some(path), None) => SourceOrigin::Path(base.join(path)),
            (None, Some(content)) => SourceOrigin::Inline(content.clone()),
            (Some(_), Some(_)) => bail!("source '{}' sets both path and content", self.id),
            (None, None) => bail!("source '{}' needs a path or inline content", self.id),
        };

        Ok(Source {
            id: self.id.clone(),
            doc_type: DocType::parse(&self.doc_type),
            format: self.format,
            origin,
        })
    }
}

impl Config {
    /// `campuslens.toml` in the working directory, or defaults when absent.
    pub fn load() -> Result<Self> {
        let path = PathBuf::from(CONFIG_FILE);
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;

        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    pub fn sources(&self) -> Result<Vec<Source>> {
        self.sources
            .iter()
            .map(|s| s.to_source(Path::new("")))
            .collect()
    }

    fn resolve_paths(&mut self, base: &Path) {
        if self.store.path.is_relative() {
            self.store.path = base.join(&self.store.path);
        }
        for source in &mut self.sources {
            if let Some(path) = &source.path {
                if path.is_relative() {
                    source.path = Some(base.join(path));
                }
            }
        }
    }
}
