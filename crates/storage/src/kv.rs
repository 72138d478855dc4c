//! Key-value backends for the offline store

use async_trait::async_trait;
use log::{debug, trace};
use serde_json::Value;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};

use crate::error::{Result, StorageError};

const FILE_EXTENSION: &str = "json";

/// Survive-restart key-value persistence
///
/// Values are whole JSON documents; a `set` replaces the previous value for
/// the key in one step, so readers never see a half-written value.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Replace the value stored under `key`
    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Delete `key`; missing keys are not an error
    async fn remove(&self, key: &str) -> Result<()>;

    /// Delete every key
    async fn clear(&self) -> Result<()>;
}

/// In-process store, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    /// 新しいメモリストアを作成
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}

/// Directory-backed store, one JSON document per key
///
/// Writes go through a single `<key>.json.tmp` file per key, so mutations
/// are serialized; clones share the lock.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    writes: Arc<Mutex<()>>,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `root`
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        debug!("Opened file store at {}", root.display());
        Ok(Self {
            root,
            writes: Arc::new(Mutex::new(())),
        })
    }

    /// Directory holding the documents
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{}.{}", key, FILE_EXTENSION)))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key)?;
        let contents = match fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        trace!("Read {} bytes from {}", contents.len(), path.display());
        Ok(Some(serde_json::from_slice(&contents)?))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp_path = path.with_extension(format!("{}.tmp", FILE_EXTENSION));
        let contents = serde_json::to_vec(&value)?;

        let _guard = self.writes.lock().await;
        // rename is atomic on the same filesystem
        fs::write(&tmp_path, &contents).await?;
        fs::rename(&tmp_path, &path).await?;
        trace!("Wrote {} bytes to {}", contents.len(), path.display());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let _guard = self.writes.lock().await;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear(&self) -> Result<()> {
        let _guard = self.writes.lock().await;
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(FILE_EXTENSION) {
                fs::remove_file(&path).await?;
            }
        }
        debug!("Cleared file store at {}", self.root.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_store_set_get_remove() {
        let store = MemoryStore::new();
        assert!(store.get("user").await.unwrap().is_none());

        store.set("user", json!({"id": 1})).await.unwrap();
        assert_eq!(store.get("user").await.unwrap(), Some(json!({"id": 1})));

        store.remove("user").await.unwrap();
        assert!(store.get("user").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let store = FileStore::open(dir.path()).await.unwrap();
        store.set("offline-visits", json!([{"local_id": "offline-1"}])).await.unwrap();
        drop(store);

        let reopened = FileStore::open(dir.path()).await.unwrap();
        let value = reopened.get("offline-visits").await.unwrap();
        assert_eq!(value, Some(json!([{"local_id": "offline-1"}])));
    }

    #[tokio::test]
    async fn test_file_store_clear_removes_documents_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        store.set("user", json!({"id": 1})).await.unwrap();
        store.set("token", json!("abc")).await.unwrap();
        std::fs::write(dir.path().join("notes.txt"), "keep me").unwrap();

        store.clear().await.unwrap();

        assert!(store.get("user").await.unwrap().is_none());
        assert!(store.get("token").await.unwrap().is_none());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn test_file_store_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        let result = store.set("../escape", json!(1)).await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_file_store_remove_missing_key_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        assert!(store.remove("user").await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_file_store_concurrent_writes_to_one_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::open(dir.path()).await.unwrap());
        let payloads: Vec<Value> = (0..16)
            .map(|i| json!({"id": i, "name": "x".repeat(i * 37)}))
            .collect();

        for _ in 0..10 {
            let mut tasks = Vec::new();
            for payload in &payloads {
                let store = store.clone();
                let payload = payload.clone();
                tasks.push(tokio::spawn(async move { store.set("user", payload).await }));
            }
            for task in tasks {
                task.await.unwrap().unwrap();
            }

            let stored = store.get("user").await.unwrap().unwrap();
            assert!(payloads.contains(&stored));
        }

        assert!(!dir.path().join("user.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_file_store_reports_corrupt_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        std::fs::write(dir.path().join("user.json"), "{not json").unwrap();

        let err = store.get("user").await.unwrap_err();
        assert!(err.is_corrupt_data());
    }
}
