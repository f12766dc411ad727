//! In-process storage.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{BackendKind, DurableStorage, StorageError, StorageKey};

/// A process-local object store.
///
/// Clones share the same map, so invocations in one process see each
/// other's writes. Nothing survives the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    objects: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl DurableStorage for MemoryStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn location(&self, key: &StorageKey) -> String {
        format!("memory://{}", key)
    }

    async fn probe(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn put(&self, key: &StorageKey, data: &[u8]) -> Result<(), StorageError> {
        self.objects
            .write()
            .await
            .insert(key.as_str().to_string(), data.to_vec());
        Ok(())
    }

    async fn get(&self, key: &StorageKey) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.objects.read().await.get(key.as_str()).cloned())
    }

    async fn exists(&self, key: &StorageKey) -> Result<bool, StorageError> {
        Ok(self.objects.read().await.contains_key(key.as_str()))
    }

    async fn delete(&self, key: &StorageKey) -> Result<(), StorageError> {
        self.objects.write().await.remove(key.as_str());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clones_share_objects() {
        let a = MemoryStorage::new();
        let b = a.clone();
        let key = StorageKey::parse("proposals/1.json").unwrap();

        a.put(&key, b"{}").await.unwrap();
        assert_eq!(b.get(&key).await.unwrap().as_deref(), Some(&b"{}"[..]));
        assert!(b.exists(&key).await.unwrap());

        b.delete(&key).await.unwrap();
        assert!(a.is_empty().await);
        assert!(!a.is_durable());
    }
}
