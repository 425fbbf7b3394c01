//! Key/value store with prefix scans
//!
//! Keys are kept ordered so a prefix scan is a range walk. When opened with a
//! path, every write is flushed to a JSON file (write to temp, then rename).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tokio::sync::RwLock;
use tracing::{debug, info};

use super::error::HostError;

/// Ordered string key/value store
#[derive(Debug, Default)]
pub struct KvStore {
    entries: RwLock<BTreeMap<String, String>>,
    path: Option<PathBuf>,
}

impl KvStore {
    /// Store that lives only as long as the process
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a store backed by a JSON file, loading it if it exists
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HostError> {
        let path = path.as_ref().to_path_buf();
        debug!(?path, "KvStore::open: called");

        let entries = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            BTreeMap::new()
        };

        info!(?path, keys = entries.len(), "Opened key/value store");
        Ok(Self {
            entries: RwLock::new(entries),
            path: Some(path),
        })
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.entries.read().await.get(key).cloned()
    }

    /// Set a key; `None` removes it
    pub async fn set(&self, key: &str, value: Option<&str>) -> Result<(), HostError> {
        debug!(%key, present = value.is_some(), "KvStore::set: called");
        let mut entries = self.entries.write().await;
        match value {
            Some(value) => {
                entries.insert(key.to_string(), value.to_string());
            }
            None => {
                entries.remove(key);
            }
        }
        self.persist(&entries)
    }

    /// All entries whose key starts with `prefix`
    pub async fn prefix(&self, prefix: &str) -> BTreeMap<String, String> {
        self.entries
            .read()
            .await
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), HostError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_string_pretty(entries)?)?;
        fs::rename(&tmp, path)?;
        debug!(?path, "KvStore::persist: flushed");
        Ok(())
    }
}
