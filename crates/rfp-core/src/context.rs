//! Invocation identity.

use std::fmt;

use uuid::Uuid;

/// Unique invocation identifier for tracing and scratch naming.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InvocationId(String);

impl InvocationId {
    /// Generate a new invocation ID.
    pub fn generate() -> Self {
        Self(format!("inv_{}", Uuid::new_v4().simple()))
    }

    /// Create from an existing ID string (e.g. a platform request id).
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
