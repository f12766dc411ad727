//! Logical storage keys.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::StorageError;

/// Maximum key length in bytes (matches the S3 object key limit).
pub const MAX_KEY_BYTES: usize = 1024;

/// A validated, backend-independent object key such as
/// `proposals/Q-2024-001/attachment.pdf`.
///
/// Keys are relative, `/`-separated, and can never escape the root of a
/// volume-backed store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorageKey(String);

impl StorageKey {
    /// Validate a raw key.
    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        let invalid = |reason| StorageError::InvalidKey {
            key: raw.chars().take(64).collect(),
            reason,
        };

        if raw.is_empty() {
            return Err(invalid("key is empty"));
        }
        if raw.len() > MAX_KEY_BYTES {
            return Err(invalid("key exceeds 1024 bytes"));
        }
        if raw.starts_with('/') {
            return Err(invalid("key must be relative"));
        }
        if raw.contains('\\') {
            return Err(invalid("key must use '/' as separator"));
        }
        if raw.chars().any(char::is_control) {
            return Err(invalid("key contains control characters"));
        }
        for segment in raw.split('/') {
            match segment {
                "" => return Err(invalid("key contains an empty segment")),
                "." | ".." => return Err(invalid("key contains a relative segment")),
                _ => {}
            }
        }

        Ok(Self(raw.to_string()))
    }

    /// Append a segment.
    pub fn join(&self, segment: &str) -> Result<Self, StorageError> {
        Self::parse(&format!("{}/{}", self.0, segment))
    }

    /// Get the key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the `/`-separated segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// The last segment.
    pub fn file_name(&self) -> &str {
        self.segments().last().unwrap_or(&self.0)
    }

    /// The key under an optional backend prefix.
    pub fn with_prefix(&self, prefix: &str) -> String {
        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() {
            self.0.clone()
        } else {
            format!("{}/{}", prefix, self.0)
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for StorageKey {
    type Error = StorageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StorageKey> for String {
    fn from(key: StorageKey) -> Self {
        key.0
    }
}
