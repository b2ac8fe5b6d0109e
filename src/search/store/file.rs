use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use super::{
    Collection, CollectionInfo, CollectionMeta, DocFilter, Document, SearchResult,
    VectorStore,
};

/// Collections are held behind `Arc` so readers can score a snapshot without
/// holding the lock while a rebuild swaps the alias.
#[derive(Debug, Default)]
struct IndexData {
    collections: HashMap<String, Arc<Collection>>,
    aliases: HashMap<String, String>,
}

impl IndexData {
    fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    fn snapshot(&self, name: &str) -> Result<Arc<Collection>> {
        let physical = self.resolve(name);
        self.collections
            .get(physical)
            .cloned()
            .ok_or_else(|| anyhow!("collection '{}' not found", name))
    }
}

#[derive(Serialize)]
struct IndexFileRef<'a> {
    collections: BTreeMap<&'a str, &'a Collection>,
    aliases: BTreeMap<&'a str, &'a str>,
}

#[derive(Deserialize)]
struct IndexFile {
    #[serde(default)]
    collections: HashMap<String, Collection>,
    #[serde(default)]
    aliases: HashMap<String, String>,
}

/// JSON-file vector store with brute-force cosine search.
pub struct FileStore {
    path: Option<PathBuf>,
    data: RwLock<IndexData>,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            data: RwLock::new(IndexData::default()),
        }
    }

    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: RwLock::new(IndexData::default()),
        }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    fn read_snapshot(&self, collection: &str) -> Result<Arc<Collection>> {
        let data = self.data.read().map_err(|e| anyhow!("{}", e))?;
        data.snapshot(collection)
    }

    fn atomic_write(&self, path: &PathBuf, data: &IndexData) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = IndexFileRef {
            collections: data
                .collections
                .iter()
                .map(|(name, c)| (name.as_str(), c.as_ref()))
                .collect(),
            aliases: data
                .aliases
                .iter()
                .map(|(alias, target)| (alias.as_str(), target.as_str()))
                .collect(),
        };

        let temp_path = path.with_extension("tmp");
        let json = serde_json::to_vec(&file)?;
        fs::write(&temp_path, json)?;
        fs::rename(temp_path, path)?;

        Ok(())
    }
}

#[async_trait]
impl VectorStore for FileStore {
    async fn create_collection(&self, collection: &str, meta: CollectionMeta) -> Result<()> {
        let mut data = self.data.write().map_err(|e| anyhow!("{}", e))?;
        data.collections.insert(
            collection.to_string(),
            Arc::new(Collection {
                meta,
                documents: Vec::new(),
            }),
        );
        Ok(())
    }

    async fn upsert(&self, collection: &str, documents: Vec<Document>) -> Result<()> {
        let mut data = self.data.write().map_err(|e| anyhow!("{}", e))?;
        let physical = data.resolve(collection).to_string();
        let entry = data
            .collections
            .get_mut(&physical)
            .ok_or_else(|| anyhow!("collection '{}' not found", collection))?;

        let target = Arc::make_mut(entry);
        let mut positions: HashMap<String, usize> = target
            .documents
            .iter()
            .enumerate()
            .map(|(i, d)| (d.id.clone(), i))
            .collect();

        for doc in documents {
            match positions.get(&doc.id) {
                Some(&i) => target.documents[i] = doc,
                None => {
                    positions.insert(doc.id.clone(), target.documents.len());
                    target.documents.push(doc);
                }
            }
        }

        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
        filter: Option<&DocFilter>,
    ) -> Result<Vec<SearchResult>> {
        let snapshot = self.read_snapshot(collection)?;
        Ok(snapshot.search(vector, k, filter))
    }

    async fn snapshot(&self, collection: &str) -> Result<Arc<Collection>> {
        self.read_snapshot(collection)
    }

    async fn documents(&self, collection: &str) -> Result<Vec<Document>> {
        let snapshot = self.read_snapshot(collection)?;
        Ok(snapshot.documents.clone())
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        let mut data = self.data.write().map_err(|e| anyhow!("{}", e))?;
        let physical = data.resolve(collection).to_string();

        data.collections.remove(&physical);
        data.aliases.retain(|_, target| *target != physical);

        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let snapshot = self.read_snapshot(collection)?;
        Ok(snapshot.documents.len())
    }

    async fn meta(&self, collection: &str) -> Result<CollectionMeta> {
        let snapshot = self.read_snapshot(collection)?;
        Ok(snapshot.meta.clone())
    }

    async fn promote(&self, alias: &str, collection: &str) -> Result<Option<String>> {
        let mut data = self.data.write().map_err(|e| anyhow!("{}", e))?;

        if !data.collections.contains_key(collection) {
            return Err(anyhow!(
                "cannot point '{}' at missing collection '{}'",
                alias,
                collection
            ));
        }

        let previous = data
            .aliases
            .insert(alias.to_string(), collection.to_string());

        Ok(previous.filter(|p| p != collection))
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let data = self.data.read().map_err(|e| anyhow!("{}", e))?;

        let mut infos: Vec<CollectionInfo> = data
            .collections
            .iter()
            .map(|(name, c)| {
                let alias = data
                    .aliases
                    .iter()
                    .find(|(_, target)| *target == name)
                    .map(|(alias, _)| alias.clone());

                let mut counts_by_type = BTreeMap::new();
                for doc in &c.documents {
                    *counts_by_type
                        .entry(doc.doc_type.as_str().to_string())
                        .or_insert(0) += 1;
                }

                CollectionInfo {
                    name: name.clone(),
                    alias,
                    document_count: c.documents.len(),
                    counts_by_type,
                    meta: c.meta.clone(),
                }
            })
            .collect();

        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }

    async fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let data = self.data.read().map_err(|e| anyhow!("{}", e))?;
        self.atomic_write(path, &data)
    }

    async fn load(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }

        let content = fs::read(path)?;
        let loaded: IndexFile = serde_json::from_slice(&content)?;

        let mut data = self.data.write().map_err(|e| anyhow!("{}", e))?;
        *data = IndexData {
            collections: loaded
                .collections
                .into_iter()
                .map(|(name, c)| (name, Arc::new(c)))
                .collect(),
            aliases: loaded.aliases,
        };

        Ok(())
    }
}
