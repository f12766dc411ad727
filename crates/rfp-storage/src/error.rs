//! Storage error types.

use rfp_core::{AdapterError, Backend};
use thiserror::Error;

/// Errors that can occur when using durable storage.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The logical key is not acceptable.
    #[error("Invalid storage key '{key}': {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// The key collides with an existing object or prefix.
    #[error("Storage key '{key}' conflicts: {reason}")]
    Conflict { key: String, reason: String },

    /// The backend could not be reached.
    #[error("Storage backend unreachable: {0}")]
    Unreachable(String),

    /// The backend refused access; credentials or volume permissions are wrong.
    #[error("Storage access denied: {0}")]
    Denied(String),

    /// The backend was reached but the operation failed.
    #[error("Storage operation failed: {0}")]
    Operation(String),

    /// Local I/O against a volume-backed store failed.
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend is configured but this build cannot serve it.
    #[error("Storage backend '{0}' is not supported by this build")]
    Unsupported(&'static str),
}

impl From<StorageError> for AdapterError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::InvalidKey { .. }
            | StorageError::Denied(_)
            | StorageError::Unsupported(_) => AdapterError::Configuration(e.to_string()),
            StorageError::Conflict { .. } => AdapterError::Conflict(e.to_string()),
            StorageError::Unreachable(_) => AdapterError::Connectivity {
                backend: Backend::Storage,
                message: e.to_string(),
            },
            StorageError::Operation(_) | StorageError::Io(_) => {
                AdapterError::Handler(anyhow::Error::new(e))
            }
        }
    }
}
