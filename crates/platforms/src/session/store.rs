use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::fetcher::error::FetchError;

/// Minimal persistence contract. The fetchers never assume a storage engine.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, FetchError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), FetchError>;

    async fn delete(&self, key: &str) -> Result<(), FetchError>;
}

/// Builds a namespaced key, e.g. `platforms/instagram/auth_mode`.
pub fn store_key(platform: &str, name: &str) -> String {
    format!("platforms/{platform}/{name}")
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<FxHashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, FetchError> {
        Ok(self.values.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), FetchError> {
        self.values.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), FetchError> {
        self.values.write().remove(key);
        Ok(())
    }
}

/// Stores every key in one JSON object file.
///
/// Writes go to a sibling temp file first and are renamed into place.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Store file `kv.json` inside `data_dir`.
    pub fn in_dir<P: AsRef<Path>>(data_dir: P) -> Self {
        Self::new(data_dir.as_ref().join("kv.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, String>, FetchError> {
        match tokio::fs::read(&self.path).await {
            Ok(content) if content.is_empty() => Ok(BTreeMap::new()),
            Ok(content) => serde_json::from_slice(&content).map_err(|e| {
                FetchError::Store(format!("corrupt store {}: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, values: &BTreeMap<String, String>) -> Result<(), FetchError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_vec_pretty(values)
            .map_err(|e| FetchError::Store(format!("failed to serialize store: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!("Saved {} key(s) to {}", values.len(), self.path.display());
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, FetchError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), FetchError> {
        let _guard = self.lock.lock().await;
        let mut values = self.load().await?;
        values.insert(key.to_string(), value.to_string());
        self.save(&values).await
    }

    async fn delete(&self, key: &str) -> Result<(), FetchError> {
        let _guard = self.lock.lock().await;
        let mut values = self.load().await?;
        if values.remove(key).is_some() {
            self.save(&values).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a").await.unwrap(), None);

        store.set("a", "1").await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));

        store.delete("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_json_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let key = store_key("instagram", "auth_mode");

        let store = JsonFileStore::in_dir(dir.path().join("data"));
        store.set(&key, "authenticated").await.unwrap();
        store.set("other", "x").await.unwrap();

        let reopened = JsonFileStore::in_dir(dir.path().join("data"));
        assert_eq!(
            reopened.get(&key).await.unwrap().as_deref(),
            Some("authenticated")
        );

        reopened.delete(&key).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), None);
        assert_eq!(store.get("other").await.unwrap().as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn test_json_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::in_dir(dir.path());
        tokio::fs::write(store.path(), b"not json").await.unwrap();

        assert!(matches!(store.get("a").await, Err(FetchError::Store(_))));
    }
}
