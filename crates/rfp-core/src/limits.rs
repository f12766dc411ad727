//! Execution limits imposed by the serverless platform.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Limits applied to a single invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionLimits {
    /// Wall-clock limit for one invocation, in milliseconds.
    pub execution_timeout_ms: u64,
    /// Maximum size of a single durable upload in bytes.
    pub max_upload_bytes: u64,
    /// Bound on establishing the database connection, in milliseconds.
    pub db_connect_timeout_ms: u64,
    /// Bound on the first storage reachability probe, in milliseconds.
    pub storage_probe_timeout_ms: u64,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self::serverless()
    }
}

impl ExecutionLimits {
    /// Limits of a typical hobby-tier serverless function.
    pub fn serverless() -> Self {
        Self {
            execution_timeout_ms: 10_000,
            max_upload_bytes: 4_718_592, // 4.5 MiB request body cap
            db_connect_timeout_ms: 3_000,
            storage_probe_timeout_ms: 2_000,
        }
    }

    /// Set the wall-clock limit.
    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout_ms = (timeout.as_millis() as u64).max(1);
        self
    }

    /// Set the maximum upload size.
    pub fn with_max_upload_bytes(mut self, bytes: u64) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    /// Set the database connect bound.
    pub fn with_db_connect_timeout_ms(mut self, ms: u64) -> Self {
        self.db_connect_timeout_ms = ms;
        self
    }

    /// Set the storage probe bound.
    pub fn with_storage_probe_timeout_ms(mut self, ms: u64) -> Self {
        self.storage_probe_timeout_ms = ms;
        self
    }

    /// Wall-clock limit as a `Duration`.
    pub fn execution_timeout(&self) -> Duration {
        Duration::from_millis(self.execution_timeout_ms)
    }

    /// Database connect bound as a `Duration`.
    pub fn db_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.db_connect_timeout_ms)
    }

    /// Storage probe bound as a `Duration`.
    pub fn storage_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_probe_timeout_ms)
    }

    /// Validate the limits configuration.
    pub fn validate(&self) -> Result<(), LimitsError> {
        if self.execution_timeout_ms == 0 {
            return Err(LimitsError::InvalidLimit(
                "execution_timeout_ms cannot be 0".into(),
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(LimitsError::InvalidLimit("max_upload_bytes cannot be 0".into()));
        }
        if self.db_connect_timeout_ms == 0 {
            return Err(LimitsError::InvalidLimit(
                "db_connect_timeout_ms cannot be 0".into(),
            ));
        }
        if self.storage_probe_timeout_ms == 0 {
            return Err(LimitsError::InvalidLimit(
                "storage_probe_timeout_ms cannot be 0".into(),
            ));
        }
        Ok(())
    }
}

/// Errors from limit violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LimitsError {
    #[error("invalid limit configuration: {0}")]
    InvalidLimit(String),

    #[error("upload size exceeded: {size} / {limit} bytes")]
    UploadTooLarge { size: u64, limit: u64 },
}

/// Tracker for durable writes made during one invocation.
#[derive(Debug, Default)]
pub struct UploadTracker {
    bytes: AtomicU64,
    count: AtomicUsize,
    rejected: AtomicUsize,
}

impl UploadTracker {
    /// Create a new tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check an upload against the limit before it is sent.
    pub fn admit(&self, size: u64, limits: &ExecutionLimits) -> Result<(), LimitsError> {
        if size > limits.max_upload_bytes {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            return Err(LimitsError::UploadTooLarge {
                size,
                limit: limits.max_upload_bytes,
            });
        }
        Ok(())
    }

    /// Record a completed upload.
    pub fn record(&self, size: u64) {
        self.bytes.fetch_add(size, Ordering::SeqCst);
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    /// Get usage summary.
    pub fn summary(&self) -> UploadSummary {
        UploadSummary {
            bytes: self.bytes.load(Ordering::SeqCst),
            count: self.count.load(Ordering::SeqCst),
            rejected: self.rejected.load(Ordering::SeqCst),
        }
    }
}

/// Summary of durable writes for one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSummary {
    pub bytes: u64,
    pub count: usize,
    pub rejected: usize,
}
