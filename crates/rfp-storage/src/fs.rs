//! Volume-backed storage.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::{BackendKind, DurableStorage, StorageError, StorageKey};

/// Objects stored as files under a root directory.
///
/// Used for mounted volumes in production and for the local development
/// fallback. Writes go to a temporary sibling and are renamed into place
/// so readers never observe a partial object.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
    durable: bool,
}

impl FsStorage {
    /// A store on a volume that outlives the execution environment.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            durable: true,
        }
    }

    /// A developer-machine store. Reported as non-durable.
    pub fn local_fallback(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            durable: false,
        }
    }

    /// Absolute file path for a key.
    pub fn path_for(&self, key: &StorageKey) -> PathBuf {
        key.segments()
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    /// Why `key` cannot be an object here, if an existing object sits on
    /// its path or the key is already a prefix of other objects.
    async fn conflict(&self, key: &StorageKey) -> Option<String> {
        let segments: Vec<&str> = key.segments().collect();
        let mut path = self.root.clone();
        for (i, segment) in segments.iter().enumerate() {
            path.push(segment);
            let meta = fs::metadata(&path).await.ok()?;
            let last = i + 1 == segments.len();
            if !last && !meta.is_dir() {
                return Some(format!("'{}' is an existing object", segments[..=i].join("/")));
            }
            if last && meta.is_dir() {
                return Some("key is a prefix of existing objects".to_string());
            }
        }
        None
    }

    async fn write_error(&self, key: &StorageKey, path: &Path, e: std::io::Error) -> StorageError {
        if let Some(reason) = self.conflict(key).await {
            return StorageError::Conflict {
                key: key.to_string(),
                reason,
            };
        }
        match e.kind() {
            ErrorKind::PermissionDenied => {
                StorageError::Denied(format!("{}: {}", path.display(), e))
            }
            _ => StorageError::Io(e),
        }
    }
}

#[async_trait]
impl DurableStorage for FsStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::Fs
    }

    fn is_durable(&self) -> bool {
        self.durable
    }

    fn location(&self, key: &StorageKey) -> String {
        format!("file://{}", self.path_for(key).display())
    }

    async fn probe(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).await.map_err(|e| {
            StorageError::Unreachable(format!("{}: {}", self.root.display(), e))
        })?;
        let meta = fs::metadata(&self.root).await.map_err(|e| {
            StorageError::Unreachable(format!("{}: {}", self.root.display(), e))
        })?;
        if meta.permissions().readonly() {
            return Err(StorageError::Unreachable(format!(
                "{} is read-only",
                self.root.display()
            )));
        }
        Ok(())
    }

    async fn put(&self, key: &StorageKey, data: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent).await {
                return Err(self.write_error(key, parent, e).await);
            }
        }

        let tmp = path.with_file_name(format!(
            ".{}.{}.tmp",
            key.file_name(),
            uuid::Uuid::new_v4().simple()
        ));
        if let Err(e) = fs::write(&tmp, data).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(self.write_error(key, &path, e).await);
        }
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(self.write_error(key, &path, e).await);
        }

        tracing::debug!(path = %path.display(), bytes = data.len(), "Stored object");
        Ok(())
    }

    async fn get(&self, key: &StorageKey) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            // A path blocked by another object holds no object itself.
            Err(e) => match self.conflict(key).await {
                Some(_) => Ok(None),
                None => Err(e.into()),
            },
        }
    }

    async fn exists(&self, key: &StorageKey) -> Result<bool, StorageError> {
        match fs::metadata(self.path_for(key)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            // A path blocked by another object holds no object itself.
            Err(e) => match self.conflict(key).await {
                Some(_) => Ok(false),
                None => Err(e.into()),
            },
        }
    }

    async fn delete(&self, key: &StorageKey) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            // A path blocked by another object holds no object itself.
            Err(e) => match self.conflict(key).await {
                Some(_) => Ok(()),
                None => Err(e.into()),
            },
        }
    }
}
