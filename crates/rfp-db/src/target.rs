//! Connection string resolution.

use std::fmt;
use std::path::{Path, PathBuf};

use rfp_core::{AdapterConfig, ProvisionWarning, RuntimeMode};
use url::Url;

use crate::DbError;

/// Rewrite the legacy `postgres://` scheme to `postgresql://`.
///
/// Matching is case-insensitive; every other string is returned unchanged.
pub fn normalize_database_url(raw: &str) -> String {
    const LEGACY: &str = "postgres://";
    match raw.get(..LEGACY.len()) {
        Some(scheme) if scheme.eq_ignore_ascii_case(LEGACY) => {
            format!("postgresql://{}", &raw[LEGACY.len()..])
        }
        _ => raw.to_string(),
    }
}

/// Where an invocation's database lives.
#[derive(Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    /// A network PostgreSQL service.
    Durable { url: String },
    /// A local SQLite file. Never durable.
    LocalFile { path: PathBuf },
}

impl DatabaseTarget {
    /// Resolve the target from configuration.
    ///
    /// Returns the warning to surface when the local-file fallback is used.
    pub fn resolve(
        config: &AdapterConfig,
    ) -> Result<(Self, Option<ProvisionWarning>), DbError> {
        let Some(raw) = config.database_url.as_ref().map(|s| s.expose().trim()) else {
            return match config.mode {
                RuntimeMode::Production => Err(DbError::MissingUrl),
                RuntimeMode::Development => {
                    let path = config.local_database_path.clone();
                    let warning = ProvisionWarning::LocalDatabaseFallback { path: path.clone() };
                    Ok((Self::LocalFile { path }, Some(warning)))
                }
            };
        };

        let target = Self::parse(raw)?;
        match (&target, config.mode) {
            (Self::LocalFile { path }, RuntimeMode::Production) => {
                Err(DbError::LocalFileInProduction(path.clone()))
            }
            (Self::LocalFile { path }, RuntimeMode::Development) => {
                let warning = ProvisionWarning::LocalDatabaseFallback { path: path.clone() };
                Ok((target, Some(warning)))
            }
            (Self::Durable { .. }, _) => Ok((target, None)),
        }
    }

    /// Classify a connection string without regard to runtime mode.
    pub fn parse(raw: &str) -> Result<Self, DbError> {
        let normalized = normalize_database_url(raw);

        if let Some(path) = sqlite_path(&normalized) {
            return Ok(Self::LocalFile { path });
        }

        let url = Url::parse(&normalized).map_err(|e| DbError::InvalidUrl(e.to_string()))?;
        match url.scheme() {
            "postgresql" => {
                if url.host_str().map_or(true, str::is_empty) {
                    return Err(DbError::InvalidUrl("missing host".to_string()));
                }
                Ok(Self::Durable { url: normalized })
            }
            "file" => url
                .to_file_path()
                .map(|path| Self::LocalFile { path })
                .map_err(|_| DbError::InvalidUrl("invalid file path".to_string())),
            other => Err(DbError::UnsupportedScheme(other.to_string())),
        }
    }

    /// Whether the target outlives the execution environment.
    pub fn is_durable(&self) -> bool {
        matches!(self, Self::Durable { .. })
    }

    /// The local file path, if any.
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            Self::LocalFile { path } => Some(path),
            Self::Durable { .. } => None,
        }
    }
}

fn sqlite_path(raw: &str) -> Option<PathBuf> {
    let lower = raw.to_ascii_lowercase();
    let rest = if lower.starts_with("sqlite://") {
        &raw["sqlite://".len()..]
    } else if lower.starts_with("sqlite:") {
        &raw["sqlite:".len()..]
    } else {
        return None;
    };
    let path = rest.split('?').next().unwrap_or(rest);
    Some(PathBuf::from(path))
}

/// Redacts credentials.
impl fmt::Display for DatabaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Durable { url } => match Url::parse(url) {
                Ok(mut parsed) => {
                    if parsed.password().is_some() {
                        let _ = parsed.set_password(Some("***"));
                    }
                    write!(f, "{}", parsed)
                }
                Err(_) => write!(f, "postgresql://***"),
            },
            Self::LocalFile { path } => write!(f, "sqlite://{}", path.display()),
        }
    }
}

impl fmt::Debug for DatabaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DatabaseTarget")
            .field(&self.to_string())
            .finish()
    }
}
