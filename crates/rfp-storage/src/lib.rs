//! Durable storage for stateless invocations.
//!
//! Anything written here must be readable by a later invocation that may
//! run on a different machine. The backends:
//! - `S3Storage` - S3-compatible object storage (feature `s3`)
//! - `FsStorage` - a mounted volume, or the local development fallback
//! - `MemoryStorage` - process-local, for development and tests

mod backend;
mod error;
mod fs;
mod key;
mod memory;
#[cfg(feature = "s3")]
mod s3;

use std::sync::Arc;

use rfp_core::StorageSettings;

pub use backend::{BackendKind, DurableStorage};
pub use error::StorageError;
pub use fs::FsStorage;
pub use key::{StorageKey, MAX_KEY_BYTES};
pub use memory::MemoryStorage;
#[cfg(feature = "s3")]
pub use s3::S3Storage;

/// Open the backend described by `settings`.
///
/// No network traffic happens here; reachability is checked by
/// [`DurableStorage::probe`].
pub async fn open_backend(
    settings: &StorageSettings,
) -> Result<Arc<dyn DurableStorage>, StorageError> {
    match settings {
        #[cfg(feature = "s3")]
        StorageSettings::S3 {
            bucket,
            prefix,
            region,
        } => Ok(Arc::new(
            S3Storage::connect(bucket, prefix, region.as_deref()).await,
        )),
        #[cfg(not(feature = "s3"))]
        StorageSettings::S3 { .. } => Err(StorageError::Unsupported("s3")),
        StorageSettings::Fs { root } => Ok(Arc::new(FsStorage::new(root))),
        StorageSettings::Memory => Ok(Arc::new(MemoryStorage::new())),
    }
}
