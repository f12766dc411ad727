//! Adapter configuration.
//!
//! Configuration is an explicit value handed to the adapter; nothing here is
//! read from process-global state except through [`AdapterConfig::from_env`].

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AdapterError;
use crate::limits::ExecutionLimits;

/// Environment keys understood by [`AdapterConfig::from_lookup`].
pub mod keys {
    pub const RFP_ENV: &str = "RFP_ENV";
    pub const APP_ENV: &str = "APP_ENV";
    pub const VERCEL_ENV: &str = "VERCEL_ENV";
    pub const SECRET_KEY: &str = "SECRET_KEY";
    pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";
    pub const DATABASE_URL: &str = "DATABASE_URL";
    pub const LOCAL_DATABASE_PATH: &str = "LOCAL_DATABASE_PATH";
    pub const SCRATCH_DIR: &str = "SCRATCH_DIR";
    pub const STORAGE_BACKEND: &str = "STORAGE_BACKEND";
    pub const STORAGE_BUCKET: &str = "STORAGE_BUCKET";
    pub const STORAGE_PREFIX: &str = "STORAGE_PREFIX";
    pub const STORAGE_REGION: &str = "STORAGE_REGION";
    pub const STORAGE_ROOT: &str = "STORAGE_ROOT";
    pub const LOCAL_STORAGE_DIR: &str = "LOCAL_STORAGE_DIR";
    pub const INVOCATION_TIMEOUT_SECS: &str = "INVOCATION_TIMEOUT_SECS";
    pub const MAX_UPLOAD_BYTES: &str = "MAX_UPLOAD_BYTES";
    pub const DB_CONNECT_TIMEOUT_MS: &str = "DB_CONNECT_TIMEOUT_MS";
    pub const STORAGE_PROBE_TIMEOUT_MS: &str = "STORAGE_PROBE_TIMEOUT_MS";
}

const DEFAULT_LOCAL_DATABASE_PATH: &str = "rfp_local.db";
const DEFAULT_LOCAL_STORAGE_DIR: &str = ".rfp-data/storage";

/// Whether local fallbacks are permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    #[default]
    Development,
    Production,
}

impl RuntimeMode {
    /// Parse an environment name. Anything other than production is development.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    /// Check if production mode is active.
    pub fn is_production(self) -> bool {
        self == Self::Production
    }

    /// Get mode as string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

/// A credential that never shows up in logs or serialized config.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the raw value.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(***)")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("***")
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Secret)
    }
}

/// Durable storage backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageSettings {
    /// S3-compatible object storage.
    S3 {
        bucket: String,
        #[serde(default)]
        prefix: String,
        #[serde(default)]
        region: Option<String>,
    },
    /// A mounted volume that outlives the execution environment.
    Fs { root: PathBuf },
    /// In-process store. Shared between invocations of one process only.
    Memory,
}

impl StorageSettings {
    /// Backend name as it appears in `STORAGE_BACKEND`.
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::S3 { .. } => "s3",
            Self::Fs { .. } => "fs",
            Self::Memory => "memory",
        }
    }
}

/// Configuration for the invocation adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Runtime mode.
    pub mode: RuntimeMode,
    /// Signing secret used by the auth layer.
    pub secret_key: Option<Secret>,
    /// Third-party AI credential.
    pub gemini_api_key: Option<Secret>,
    /// Database connection string.
    pub database_url: Option<Secret>,
    /// Local-file database used when `database_url` is absent (development only).
    pub local_database_path: PathBuf,
    /// Where scratch directories are allocated. Defaults to the OS temp dir.
    pub scratch_root: Option<PathBuf>,
    /// Durable storage backend.
    pub storage: Option<StorageSettings>,
    /// Local storage directory used when `storage` is absent (development only).
    pub local_storage_dir: PathBuf,
    /// Execution limits.
    pub limits: ExecutionLimits,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            mode: RuntimeMode::Development,
            secret_key: None,
            gemini_api_key: None,
            database_url: None,
            local_database_path: PathBuf::from(DEFAULT_LOCAL_DATABASE_PATH),
            scratch_root: None,
            storage: None,
            local_storage_dir: PathBuf::from(DEFAULT_LOCAL_STORAGE_DIR),
            limits: ExecutionLimits::default(),
        }
    }
}

impl AdapterConfig {
    /// Create a development configuration with defaults.
    pub fn development() -> Self {
        Self::default()
    }

    /// Create a production configuration with defaults.
    pub fn production() -> Self {
        Self {
            mode: RuntimeMode::Production,
            ..Self::default()
        }
    }

    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, AdapterError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AdapterError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mode = [keys::RFP_ENV, keys::APP_ENV, keys::VERCEL_ENV]
            .iter()
            .find_map(|key| get(*key))
            .map(|value| RuntimeMode::parse(&value))
            .unwrap_or_default();

        let mut config = Self {
            mode,
            secret_key: get(keys::SECRET_KEY).map(Secret),
            gemini_api_key: get(keys::GEMINI_API_KEY).map(Secret),
            database_url: get(keys::DATABASE_URL).map(Secret),
            scratch_root: get(keys::SCRATCH_DIR).map(PathBuf::from),
            storage: storage_from_lookup(&get)?,
            ..Self::default()
        };

        if let Some(path) = get(keys::LOCAL_DATABASE_PATH) {
            config.local_database_path = PathBuf::from(path);
        }
        if let Some(dir) = get(keys::LOCAL_STORAGE_DIR) {
            config.local_storage_dir = PathBuf::from(dir);
        }
        if let Some(secs) = parse_u64(&get, keys::INVOCATION_TIMEOUT_SECS)? {
            config.limits.execution_timeout_ms = secs.saturating_mul(1_000);
        }
        if let Some(bytes) = parse_u64(&get, keys::MAX_UPLOAD_BYTES)? {
            config.limits.max_upload_bytes = bytes;
        }
        if let Some(ms) = parse_u64(&get, keys::DB_CONNECT_TIMEOUT_MS)? {
            config.limits.db_connect_timeout_ms = ms;
        }
        if let Some(ms) = parse_u64(&get, keys::STORAGE_PROBE_TIMEOUT_MS)? {
            config.limits.storage_probe_timeout_ms = ms;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, AdapterError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AdapterError::configuration(format!("invalid config file: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), AdapterError> {
        self.limits
            .validate()
            .map_err(|e| AdapterError::configuration(e.to_string()))?;

        match &self.storage {
            Some(StorageSettings::S3 { bucket, .. }) if bucket.trim().is_empty() => {
                return Err(AdapterError::configuration(
                    "STORAGE_BUCKET must be set for the s3 backend",
                ));
            }
            Some(StorageSettings::Fs { root }) if root.as_os_str().is_empty() => {
                return Err(AdapterError::configuration(
                    "STORAGE_ROOT must be set for the fs backend",
                ));
            }
            Some(StorageSettings::Memory) if self.mode.is_production() => {
                return Err(AdapterError::configuration(
                    "the memory storage backend is not durable and cannot be used in production",
                ));
            }
            _ => {}
        }

        if self.mode.is_production() && self.secret_key.is_none() {
            return Err(AdapterError::configuration(
                "SECRET_KEY must be set in production",
            ));
        }

        Ok(())
    }

    /// Non-fatal configuration gaps worth reporting to operators.
    pub fn advisories(&self) -> Vec<String> {
        let mut notes = Vec::new();
        if self.gemini_api_key.is_none() {
            notes.push(format!(
                "{} is not set; AI price justification is unavailable",
                keys::GEMINI_API_KEY
            ));
        }
        if self.secret_key.is_none() {
            notes.push(format!(
                "{} is not set; tokens cannot be signed",
                keys::SECRET_KEY
            ));
        }
        if self.database_url.is_none() {
            notes.push(format!(
                "{} is not set; data is stored in a non-durable local file",
                keys::DATABASE_URL
            ));
        }
        if self.storage.is_none() {
            notes.push(format!(
                "{} is not set; uploads are stored in a non-durable local directory",
                keys::STORAGE_BACKEND
            ));
        }
        notes
    }

    /// Set the database connection string.
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(Secret::new(url));
        self
    }

    /// Set the signing secret.
    pub fn with_secret_key(mut self, key: impl Into<String>) -> Self {
        self.secret_key = Some(Secret::new(key));
        self
    }

    /// Set the local-file database path.
    pub fn with_local_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_database_path = path.into();
        self
    }

    /// Set the scratch root.
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    /// Set the durable storage backend.
    pub fn with_storage(mut self, storage: StorageSettings) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Set the local storage fallback directory.
    pub fn with_local_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.local_storage_dir = dir.into();
        self
    }

    /// Set execution limits.
    pub fn with_limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Root under which scratch directories are allocated.
    pub fn scratch_root(&self) -> PathBuf {
        self.scratch_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

fn storage_from_lookup<G>(get: &G) -> Result<Option<StorageSettings>, AdapterError>
where
    G: Fn(&str) -> Option<String>,
{
    let Some(backend) = get(keys::STORAGE_BACKEND) else {
        return Ok(None);
    };

    match backend.to_ascii_lowercase().as_str() {
        "none" => Ok(None),
        "s3" => {
            let bucket = get(keys::STORAGE_BUCKET).ok_or_else(|| {
                AdapterError::configuration("STORAGE_BUCKET must be set for the s3 backend")
            })?;
            Ok(Some(StorageSettings::S3 {
                bucket,
                prefix: get(keys::STORAGE_PREFIX).unwrap_or_default(),
                region: get(keys::STORAGE_REGION),
            }))
        }
        "fs" => {
            let root = get(keys::STORAGE_ROOT).ok_or_else(|| {
                AdapterError::configuration("STORAGE_ROOT must be set for the fs backend")
            })?;
            Ok(Some(StorageSettings::Fs {
                root: PathBuf::from(root),
            }))
        }
        "memory" => Ok(Some(StorageSettings::Memory)),
        other => Err(AdapterError::configuration(format!(
            "unknown STORAGE_BACKEND '{other}' (expected s3, fs or memory)"
        ))),
    }
}

fn parse_u64<G>(get: &G, key: &str) -> Result<Option<u64>, AdapterError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(None),
        Some(raw) => raw.parse::<u64>().map(Some).map_err(|_| {
            AdapterError::configuration(format!(
                "{key} must be a non-negative integer, got '{raw}'"
            ))
        }),
    }
}
