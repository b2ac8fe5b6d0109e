mod args;
mod build;
mod query;
mod status;

pub use args::{Args, Command};
pub use build::run_build;
pub use query::{run_query, QueryOptions};
pub use status::run_status;

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::search::{FileStore, VectorStore};

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

/// The configured store with its file contents loaded.
pub(crate) async fn open_store(config: &Config) -> Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = Arc::new(FileStore::new(config.store.path.clone()));
    store.load().await?;
    Ok(store)
}

/// Char-safe preview of at most `max` characters.
pub(crate) fn preview(text: &str, max: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > max {
        let head: String = flat.chars().take(max).collect();
        format!("{}...", head)
    } else {
        flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_counts_chars() {
        assert_eq!(preview("计算机科学与技术", 3), "计算机...");
        assert_eq!(preview("a\n  b", 10), "a b");
    }
}
