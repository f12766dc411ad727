//! Database access for stateless invocations.
//!
//! Resolves `DATABASE_URL` into a [`DatabaseTarget`] and opens one exclusive
//! [`DatabaseHandle`] per invocation. A local SQLite file is only ever a
//! development fallback.
//!
//! # Example
//!
//! ```rust,ignore
//! use rfp_db::{params, DatabaseConnector, DatabaseTarget, SqlxConnector};
//!
//! let (target, warning) = DatabaseTarget::resolve(&config)?;
//! let mut db = SqlxConnector.connect(&target, config.limits.db_connect_timeout()).await?;
//!
//! db.execute(
//!     "INSERT INTO proposals (id, client) VALUES ($1, $2)",
//!     params!["Q-2024-001", "Ministry of Finance"],
//! ).await?;
//! db.close().await?;
//! ```

mod db;
mod error;
mod target;
mod types;

pub use db::{DatabaseConnection, DatabaseConnector, DatabaseHandle, SqlxConnector};
pub use error::DbError;
pub use target::{normalize_database_url, DatabaseTarget};
pub use types::Value;

/// Create a parameter list for SQL statements.
///
/// # Example
///
/// ```rust,ignore
/// use rfp_db::params;
///
/// let params = params!["Q-1", 42, 3.14];
/// ```
#[macro_export]
macro_rules! params {
    () => {
        &[]
    };
    ($($param:expr),+ $(,)?) => {
        &[$($crate::Value::from($param)),+]
    };
}
