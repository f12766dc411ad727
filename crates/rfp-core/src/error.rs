//! Adapter error taxonomy and its client-facing mapping.

use std::fmt;
use std::time::Duration;

use http::StatusCode;
use serde::Serialize;

use crate::context::InvocationId;
use crate::limits::LimitsError;

/// The durable service an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Database,
    Storage,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database => write!(f, "database"),
            Self::Storage => write!(f, "storage"),
        }
    }
}

/// Errors surfaced by the invocation adapter.
///
/// Configuration and connectivity errors are never retried here; retry
/// policy belongs to the caller.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{backend} unreachable: {message}")]
    Connectivity { backend: Backend, message: String },

    #[error("invocation cancelled after {limit:?} execution limit")]
    TimeoutCancellation { limit: Duration },

    #[error(transparent)]
    LimitExceeded(#[from] LimitsError),

    #[error("storage key conflict: {0}")]
    Conflict(String),

    #[error("invocation {0} is closed")]
    ContextClosed(InvocationId),

    #[error("scratch directory I/O failed: {0}")]
    Scratch(#[from] std::io::Error),

    #[error("handler failed: {0:#}")]
    Handler(anyhow::Error),
}

/// Coarse error category, stable for matching in callers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Connectivity,
    TimeoutCancellation,
    LimitExceeded,
    Conflict,
    ContextClosed,
    Scratch,
    Handler,
}

impl AdapterError {
    /// Shorthand for a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Shorthand for a connectivity error.
    pub fn connectivity(backend: Backend, message: impl Into<String>) -> Self {
        Self::Connectivity {
            backend,
            message: message.into(),
        }
    }

    /// Get the error category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Connectivity { .. } => ErrorKind::Connectivity,
            Self::TimeoutCancellation { .. } => ErrorKind::TimeoutCancellation,
            Self::LimitExceeded(_) => ErrorKind::LimitExceeded,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::ContextClosed(_) => ErrorKind::ContextClosed,
            Self::Scratch(_) => ErrorKind::Scratch,
            Self::Handler(_) => ErrorKind::Handler,
        }
    }

    /// Map to the error body returned to HTTP clients.
    ///
    /// Misconfigured or absent durable backends are the most common fault,
    /// so each category gets its own status and code.
    pub fn client_error(&self) -> ClientError {
        let (status, code, detail) = match self {
            Self::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "configuration_error",
                format!("Service is misconfigured: {msg}"),
            ),
            Self::Connectivity { backend, .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "backend_unreachable",
                format!("The {backend} service is currently unreachable"),
            ),
            Self::TimeoutCancellation { .. } => (
                StatusCode::GATEWAY_TIMEOUT,
                "invocation_timeout",
                "The request exceeded the execution time limit".to_string(),
            ),
            Self::LimitExceeded(e) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                e.to_string(),
            ),
            Self::Conflict(_) => (
                StatusCode::CONFLICT,
                "storage_conflict",
                "The storage key collides with an existing object".to_string(),
            ),
            Self::ContextClosed(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "invocation_closed",
                "Internal server error".to_string(),
            ),
            Self::Scratch(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "scratch_io",
                "Internal server error".to_string(),
            ),
            Self::Handler(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error".to_string(),
            ),
        };

        ClientError {
            status,
            code,
            detail,
        }
    }
}

/// Client-facing error body.
#[derive(Debug, Clone, Serialize)]
pub struct ClientError {
    /// HTTP status to respond with.
    #[serde(skip)]
    pub status: StatusCode,
    /// Stable machine-readable code.
    pub code: &'static str,
    /// Human-readable detail.
    pub detail: String,
}

impl ClientError {
    /// Format as a JSON response body.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.detail.clone())
    }
}
