use docseal_exchange::{ExchangeError, FsObjectStore, MemoryObjectStore, ObjectStore};
use pretty_assertions::assert_eq;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tempfile::TempDir;

async fn put_get_overwrite(store: &dyn ObjectStore) {
    store.put("a.archived.zip.pgp", b"first".to_vec()).await.unwrap();
    assert_eq!(store.get("a.archived.zip.pgp").await.unwrap(), b"first");
    assert!(store.exists("a.archived.zip.pgp").await.unwrap());

    store.put("a.archived.zip.pgp", b"second".to_vec()).await.unwrap();
    assert_eq!(store.get("a.archived.zip.pgp").await.unwrap(), b"second");

    store.put("empty", Vec::new()).await.unwrap();
    assert!(store.get("empty").await.unwrap().is_empty());
}

async fn missing_is_not_found(store: &dyn ObjectStore) {
    let err = store.get("never-written").await.unwrap_err();
    assert!(matches!(err, ExchangeError::NotFound(key) if key == "never-written"));
    assert!(!store.exists("never-written").await.unwrap());
}

#[tokio::test]
async fn memory_store_put_get() {
    let store = MemoryObjectStore::new();
    put_get_overwrite(&store).await;
    missing_is_not_found(&store).await;
    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn memory_store_versions_are_unique() {
    let store = MemoryObjectStore::new();
    let v1 = store.put("k", b"same".to_vec()).await.unwrap();
    let v2 = store.put("k", b"same".to_vec()).await.unwrap();
    assert_ne!(v1, v2);
}

#[tokio::test]
async fn memory_store_replace_requires_existing_key() {
    let store = MemoryObjectStore::new();
    let err = store.replace("k", b"x".to_vec()).await.unwrap_err();
    assert!(matches!(err, ExchangeError::NotFound(_)));

    store.put("k", b"old".to_vec()).await.unwrap();
    store.replace("k", b"new".to_vec()).await.unwrap();
    assert_eq!(store.get("k").await.unwrap(), b"new");
}

#[tokio::test]
async fn fs_store_put_get() {
    let dir = TempDir::new().unwrap();
    let store = FsObjectStore::new(dir.path());
    put_get_overwrite(&store).await;
    missing_is_not_found(&store).await;
    assert_eq!(
        std::fs::read(dir.path().join("a.archived.zip.pgp")).unwrap(),
        b"second"
    );
}

#[tokio::test]
async fn fs_store_version_is_content_hash() {
    let dir = TempDir::new().unwrap();
    let store = FsObjectStore::new(dir.path());
    let version = store.put("k", b"payload".to_vec()).await.unwrap();
    assert_eq!(version, hex::encode(Sha256::digest(b"payload")));
}

#[tokio::test]
async fn fs_store_creates_nested_prefixes() {
    let dir = TempDir::new().unwrap();
    let store = FsObjectStore::new(dir.path().join("root"));
    store.put("inbound/2026/x.pgp", b"nested".to_vec()).await.unwrap();
    assert_eq!(store.get("inbound/2026/x.pgp").await.unwrap(), b"nested");
    assert!(dir.path().join("root/inbound/2026/x.pgp").is_file());

    let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("root/inbound/2026"))
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(leftovers.len(), 1);
}

#[tokio::test]
async fn fs_store_rejects_escaping_keys() {
    let dir = TempDir::new().unwrap();
    let store = FsObjectStore::new(dir.path().join("root"));
    for key in ["../outside", "/etc/passwd", "", "a/../../b"] {
        let err = store.put(key, b"x".to_vec()).await.unwrap_err();
        assert!(matches!(err, ExchangeError::Store(_)), "{key}");
    }
    assert!(!dir.path().join("outside").exists());
}

#[tokio::test]
async fn stores_work_behind_shared_trait_objects() {
    let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
    let writer = store.clone();
    let handle = tokio::spawn(async move { writer.put("shared", b"v".to_vec()).await });
    handle.await.unwrap().unwrap();
    assert_eq!(store.get("shared").await.unwrap(), b"v");
}
