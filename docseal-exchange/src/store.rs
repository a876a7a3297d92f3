//! Object store interface and the two bundled backends.
//!
//! The pipeline only needs `put` and `get`. Network-backed stores implement
//! [`ObjectStore`] outside this crate.

use crate::error::{ExchangeError, ExchangeResult};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Opaque keyed blob storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `data` under `key`, replacing any previous object, and returns
    /// a version token for the stored bytes.
    async fn put(&self, key: &str, data: Vec<u8>) -> ExchangeResult<String>;

    /// Fetches the bytes stored under `key`.
    async fn get(&self, key: &str) -> ExchangeResult<Vec<u8>>;

    /// Returns true if an object exists under `key`.
    async fn exists(&self, key: &str) -> ExchangeResult<bool> {
        match self.get(key).await {
            Ok(_) => Ok(true),
            Err(ExchangeError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

// ── MemoryObjectStore ───────────────────────────────────────────

/// In-memory store. Clones share the same objects.
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// Overwrites an object in place, bypassing versioning.
    pub async fn replace(&self, key: &str, data: Vec<u8>) -> ExchangeResult<()> {
        match self.objects.write().await.get_mut(key) {
            Some(slot) => {
                *slot = data;
                Ok(())
            }
            None => Err(ExchangeError::NotFound(key.to_string())),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> ExchangeResult<String> {
        let size = data.len();
        self.objects.write().await.insert(key.to_string(), data);
        debug!(key, size, "stored object in memory");
        Ok(Uuid::new_v4().to_string())
    }

    async fn get(&self, key: &str) -> ExchangeResult<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| ExchangeError::NotFound(key.to_string()))
    }

    async fn exists(&self, key: &str) -> ExchangeResult<bool> {
        Ok(self.objects.read().await.contains_key(key))
    }
}

// ── FsObjectStore ───────────────────────────────────────────────

/// Stores each object as a file under a root directory.
///
/// Keys may contain `/` to form nested prefixes. The version token is the
/// hex SHA-256 of the stored bytes.
#[derive(Clone, Debug)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> ExchangeResult<PathBuf> {
        let invalid = || ExchangeError::Store(format!("invalid object key: {key:?}"));
        if key.is_empty() || key.contains('\\') || key.ends_with('/') {
            return Err(invalid());
        }
        let mut path = self.root.clone();
        for component in Path::new(key).components() {
            match component {
                Component::Normal(part) => path.push(part),
                _ => return Err(invalid()),
            }
        }
        Ok(path)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> ExchangeResult<String> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let version = hex::encode(Sha256::digest(&data));
        let staging = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        tokio::fs::write(&staging, &data).await?;
        if let Err(e) = tokio::fs::rename(&staging, &path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }

        debug!(key, size = data.len(), path = %path.display(), "stored object on disk");
        Ok(version)
    }

    async fn get(&self, key: &str) -> ExchangeResult<Vec<u8>> {
        let path = self.object_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!(key, size = bytes.len(), "read object from disk");
                Ok(bytes)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ExchangeError::NotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> ExchangeResult<bool> {
        let path = self.object_path(key)?;
        Ok(tokio::fs::try_exists(&path).await? && path.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_keys_stay_under_root() {
        let store = FsObjectStore::new("/data/store");
        assert_eq!(
            store.object_path("in/abc.archived.zip.pgp").unwrap(),
            PathBuf::from("/data/store/in/abc.archived.zip.pgp")
        );
        for key in ["", "../x", "/abs", "a/../../b", "dir/", "a\\b", "./a"] {
            assert!(store.object_path(key).is_err(), "{key}");
        }
    }

    #[tokio::test]
    async fn memory_clones_share_objects() {
        let store = MemoryObjectStore::new();
        let clone = store.clone();
        store.put("k", b"v".to_vec()).await.unwrap();
        assert_eq!(clone.get("k").await.unwrap(), b"v");
        assert_eq!(clone.len().await, 1);
    }
}
