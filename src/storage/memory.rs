use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use bytes::Bytes;

use super::error::StorageError;
use super::ObjectStore;

/// One stored object as the in-memory backend keeps it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub content_type: String,
    pub bytes: Bytes,
}

/// In-memory object store, for asserting on exactly what got uploaded.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<StoredObject> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored paths, sorted for stable assertions.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, path: &str, content_type: &str, bytes: Bytes) -> Result<(), StorageError> {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                path.to_string(),
                StoredObject {
                    content_type: content_type.to_string(),
                    bytes,
                },
            );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_get_round_trip() {
        let store = MemoryObjectStore::new();
        store
            .put("2023/Jul/a.jpg", "image/jpeg", Bytes::from_static(b"abc"))
            .await
            .unwrap();

        let object = store.get("2023/Jul/a.jpg").unwrap();
        assert_eq!(object.content_type, "image/jpeg");
        assert_eq!(object.bytes.as_ref(), b"abc");
        assert!(store.get("2023/Jul/missing.jpg").is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_existing_object() {
        let store = MemoryObjectStore::new();
        store
            .put("p", "image/png", Bytes::from_static(b"one"))
            .await
            .unwrap();
        store
            .put("p", "image/jpeg", Bytes::from_static(b"two"))
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        let object = store.get("p").unwrap();
        assert_eq!(object.content_type, "image/jpeg");
        assert_eq!(object.bytes.as_ref(), b"two");
    }

    #[tokio::test]
    async fn test_paths_are_sorted() {
        let store = MemoryObjectStore::new();
        store.put("b", "text/plain", Bytes::new()).await.unwrap();
        store.put("a", "text/plain", Bytes::new()).await.unwrap();
        assert_eq!(store.paths(), vec!["a".to_string(), "b".to_string()]);
    }
}
