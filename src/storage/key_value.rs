// src/storage/key_value.rs
//! Durable keyed store for opaque byte blobs.
//!
//! The verifier persists everything it needs offline (trust snapshot, pending
//! queues) through this trait. Implementations must make a single `set`
//! crash-consistent: after a crash the key holds either the old or the new
//! blob, never a mix.
//!
//! # Implementations
//! - [`MemoryStore`]: process-local, for tests and ephemeral devices
//! - [`FileStore`]: one file per key, written via temp file + rename

use crate::errors::StoreError;
use crate::utils::serialization::{from_blob, to_blob};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Get/set/clear of named byte blobs.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the blob stored under `key`, or `None` if it was never set or was cleared.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replaces the blob stored under `key`.
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// Removes `key`. Clearing an absent key is not an error.
    async fn clear(&self, key: &str) -> Result<(), StoreError>;
}

/// Stores a JSON-serializable value under `key`.
///
/// # Returns
/// `Err` if serialization or the underlying write fails
pub async fn store_json<T: Serialize + Sync + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let blob = to_blob(value)?;
    store.set(key, blob).await
}

/// Retrieves and deserializes a JSON value stored under `key`.
///
/// # Returns
/// - `Ok(None)` if the key is absent
/// - `Err(StoreError::Decode)` if the stored blob does not parse as `T`
pub async fn retrieve_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(key).await? {
        Some(blob) => from_blob(&blob).map(Some),
        None => Ok(None),
    }
}

/// In-memory keyed store.
///
/// Can be switched to read-only, in which case every write fails the way a
/// full or write-protected flash partition would.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    read_only: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects (or accepts again) all subsequent `set`/`clear` calls.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Number of keys currently stored
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_writable(&self, key: &str) -> Result<(), StoreError> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StoreError::Io {
                key: key.to_string(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "store is read-only"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.check_writable(key)?;
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<(), StoreError> {
        self.check_writable(key)?;
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

/// Keyed store backed by a directory, one `<key>.json` file per key.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens (creating if needed) a store rooted at `root`.
    ///
    /// # Errors
    /// Returns `Err` if the directory cannot be created
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await.map_err(|source| StoreError::Io {
            key: root.display().to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        let io_err = |source: io::Error| StoreError::Io {
            key: key.to_string(),
            source,
        };

        let mut file = fs::File::create(&tmp).await.map_err(io_err)?;
        file.write_all(&value).await.map_err(io_err)?;
        file.sync_all().await.map_err(io_err)?;
        drop(file);

        // rename is atomic on the same filesystem
        fs::rename(&tmp, &path).await.map_err(io_err)
    }

    async fn clear(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_get_set_clear() {
        let store = MemoryStore::new();
        assert!(store.get("queue").await.unwrap().is_none());

        store.set("queue", b"[1,2]".to_vec()).await.unwrap();
        assert_eq!(store.get("queue").await.unwrap().unwrap(), b"[1,2]");

        store.clear("queue").await.unwrap();
        assert!(store.get("queue").await.unwrap().is_none());
        // Clearing twice is fine
        store.clear("queue").await.unwrap();
    }

    #[tokio::test]
    async fn test_read_only_memory_store_keeps_old_value() {
        let store = MemoryStore::new();
        store.set("k", b"old".to_vec()).await.unwrap();
        store.set_read_only(true);

        assert!(store.set("k", b"new".to_vec()).await.is_err());
        assert!(store.clear("k").await.is_err());
        assert_eq!(store.get("k").await.unwrap().unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_json_helpers() {
        let store = MemoryStore::new();
        store_json(&store, "list", &vec!["a", "b"]).await.unwrap();

        let list: Option<Vec<String>> = retrieve_json(&store, "list").await.unwrap();
        assert_eq!(list.unwrap(), vec!["a", "b"]);

        let missing: Option<Vec<String>> = retrieve_json(&store, "other").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        store.set("trust_cache", b"{}".to_vec()).await.unwrap();

        let reopened = FileStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.get("trust_cache").await.unwrap().unwrap(), b"{}");
        // No temp file left behind
        assert!(!dir.path().join("trust_cache.json.tmp").exists());

        reopened.clear("trust_cache").await.unwrap();
        assert!(store.get("trust_cache").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        assert!(matches!(
            store.set("../escape", Vec::new()).await,
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(store.get("").await, Err(StoreError::InvalidKey(_))));
    }
}
