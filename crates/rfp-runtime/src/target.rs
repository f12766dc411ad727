//! Durable storage targets handed to handlers.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rfp_core::{AdapterError, ExecutionLimits, InvocationId, UploadTracker};
use rfp_storage::{DurableStorage, StorageKey};

/// A logical key bound to the durable backend of one invocation.
///
/// Writes that return `Ok` before the invocation ends are visible to later
/// invocations. Every operation fails with
/// [`AdapterError::ContextClosed`] once the owning invocation is released.
#[derive(Clone)]
pub struct DurableStorageTarget {
    key: StorageKey,
    backend: Arc<dyn DurableStorage>,
    invocation: InvocationId,
    closed: Arc<AtomicBool>,
    uploads: Arc<UploadTracker>,
    limits: ExecutionLimits,
}

impl DurableStorageTarget {
    pub(crate) fn new(
        key: StorageKey,
        backend: Arc<dyn DurableStorage>,
        invocation: InvocationId,
        closed: Arc<AtomicBool>,
        uploads: Arc<UploadTracker>,
        limits: ExecutionLimits,
    ) -> Self {
        Self {
            key,
            backend,
            invocation,
            closed,
            uploads,
            limits,
        }
    }

    /// The logical key.
    pub fn key(&self) -> &StorageKey {
        &self.key
    }

    /// Backend-native location, e.g. `s3://bucket/uploads/Q-1/rfp.pdf`.
    pub fn location(&self) -> String {
        self.backend.location(&self.key)
    }

    /// Whether the backend survives the process.
    pub fn is_durable(&self) -> bool {
        self.backend.is_durable()
    }

    fn ensure_open(&self) -> Result<(), AdapterError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AdapterError::ContextClosed(self.invocation.clone()));
        }
        Ok(())
    }

    /// Store `data` under this key.
    ///
    /// Payloads above the upload limit are rejected before reaching the
    /// backend.
    pub async fn write(&self, data: &[u8]) -> Result<(), AdapterError> {
        self.ensure_open()?;
        let size = data.len() as u64;
        self.uploads.admit(size, &self.limits)?;

        self.backend.put(&self.key, data).await?;
        self.uploads.record(size);

        tracing::debug!(
            invocation = %self.invocation,
            location = %self.location(),
            bytes = size,
            "Durable write complete"
        );
        Ok(())
    }

    /// Read the stored object, if any.
    pub async fn read(&self) -> Result<Option<Vec<u8>>, AdapterError> {
        self.ensure_open()?;
        Ok(self.backend.get(&self.key).await?)
    }

    /// Check whether the object exists.
    pub async fn exists(&self) -> Result<bool, AdapterError> {
        self.ensure_open()?;
        Ok(self.backend.exists(&self.key).await?)
    }

    /// Remove the object.
    pub async fn delete(&self) -> Result<(), AdapterError> {
        self.ensure_open()?;
        Ok(self.backend.delete(&self.key).await?)
    }
}

impl fmt::Debug for DurableStorageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DurableStorageTarget")
            .field("key", &self.key)
            .field("location", &self.location())
            .field("invocation", &self.invocation)
            .finish()
    }
}
