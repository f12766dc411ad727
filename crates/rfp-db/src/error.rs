//! Database error types.

use std::path::PathBuf;
use std::time::Duration;

use rfp_core::{AdapterError, Backend};
use thiserror::Error;

/// Errors that can occur when resolving or using the database.
#[derive(Error, Debug)]
pub enum DbError {
    /// No connection string in production.
    #[error("DATABASE_URL must be set in production")]
    MissingUrl,

    /// A local-file database was configured in production.
    #[error("local database {0} is not durable and cannot be used in production")]
    LocalFileInProduction(PathBuf),

    /// The connection string scheme is not supported.
    #[error("unsupported database scheme '{0}'")]
    UnsupportedScheme(String),

    /// The connection string could not be parsed.
    #[error("invalid DATABASE_URL: {0}")]
    InvalidUrl(String),

    /// Connecting took longer than the configured bound.
    #[error("database connection timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// The connection could not be established.
    #[error("failed to connect to database: {0}")]
    Connect(String),

    /// Failed to execute a statement.
    #[error("Query execution failed: {0}")]
    Query(String),

    /// The handle was already closed.
    #[error("database handle is closed")]
    Closed,
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolTimedOut => {
                DbError::Connect(e.to_string())
            }
            other => DbError::Query(other.to_string()),
        }
    }
}

impl From<DbError> for AdapterError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::MissingUrl
            | DbError::LocalFileInProduction(_)
            | DbError::UnsupportedScheme(_)
            | DbError::InvalidUrl(_) => AdapterError::Configuration(e.to_string()),
            DbError::ConnectTimeout(_) | DbError::Connect(_) => AdapterError::Connectivity {
                backend: Backend::Database,
                message: e.to_string(),
            },
            DbError::Query(_) | DbError::Closed => AdapterError::Handler(anyhow::Error::new(e)),
        }
    }
}
