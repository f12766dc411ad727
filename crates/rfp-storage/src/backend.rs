//! The durable storage trait.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use crate::{StorageError, StorageKey};

/// Which kind of backend serves a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    S3,
    Fs,
    Memory,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S3 => write!(f, "s3"),
            Self::Fs => write!(f, "fs"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Storage that outlives a single invocation.
///
/// Implementations must be safe to share across concurrent invocations.
/// A write that returns `Ok` must be visible to any later invocation that
/// reads the same key.
#[async_trait]
pub trait DurableStorage: Send + Sync + fmt::Debug {
    /// The backend kind.
    fn kind(&self) -> BackendKind;

    /// Whether data survives the process. Local fallbacks return `false`.
    fn is_durable(&self) -> bool;

    /// Backend-native location for a key (`s3://bucket/key`, `file:///...`).
    fn location(&self, key: &StorageKey) -> String;

    /// Check that the backend is reachable.
    async fn probe(&self) -> Result<(), StorageError>;

    /// Store an object, replacing any previous value.
    async fn put(&self, key: &StorageKey, data: &[u8]) -> Result<(), StorageError>;

    /// Fetch an object. Returns `None` if the key doesn't exist.
    async fn get(&self, key: &StorageKey) -> Result<Option<Vec<u8>>, StorageError>;

    /// Check whether an object exists.
    async fn exists(&self, key: &StorageKey) -> Result<bool, StorageError> {
        Ok(self.get(key).await?.is_some())
    }

    /// Remove an object. Removing a missing key is not an error.
    async fn delete(&self, key: &StorageKey) -> Result<(), StorageError>;
}
