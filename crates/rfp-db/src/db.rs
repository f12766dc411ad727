//! Per-invocation database connections.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};

use crate::types::{bind_postgres, bind_sqlite};
use crate::{DatabaseTarget, DbError, Value};

/// A live connection to one of the supported engines.
pub enum DatabaseConnection {
    Postgres(PgConnection),
    Sqlite(SqliteConnection),
}

impl fmt::Debug for DatabaseConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postgres(_) => write!(f, "DatabaseConnection::Postgres"),
            Self::Sqlite(_) => write!(f, "DatabaseConnection::Sqlite"),
        }
    }
}

/// The database handle owned by exactly one invocation.
///
/// Not `Clone`; every statement takes `&mut self`. Dropping the handle
/// drops the connection; [`DatabaseHandle::close`] shuts it down cleanly.
#[derive(Debug)]
pub struct DatabaseHandle {
    target: DatabaseTarget,
    conn: Option<DatabaseConnection>,
}

impl DatabaseHandle {
    /// Wrap an established connection.
    ///
    /// `target` decides what [`is_durable`](Self::is_durable) reports, so
    /// connectors may pair any engine with the target they were asked for.
    pub fn new(target: DatabaseTarget, conn: DatabaseConnection) -> Self {
        Self {
            target,
            conn: Some(conn),
        }
    }

    /// The resolved target.
    pub fn target(&self) -> &DatabaseTarget {
        &self.target
    }

    /// Whether the data outlives the execution environment.
    pub fn is_durable(&self) -> bool {
        self.target.is_durable()
    }

    /// Whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    fn conn_mut(&mut self) -> Result<&mut DatabaseConnection, DbError> {
        self.conn.as_mut().ok_or(DbError::Closed)
    }

    /// Check the connection is alive.
    pub async fn ping(&mut self) -> Result<(), DbError> {
        match self.conn_mut()? {
            DatabaseConnection::Postgres(c) => c.ping().await?,
            DatabaseConnection::Sqlite(c) => c.ping().await?,
        }
        Ok(())
    }

    /// Execute a statement that doesn't return rows.
    ///
    /// Returns the number of affected rows. Placeholders follow the engine
    /// (`$1` for PostgreSQL, `?` for SQLite).
    pub async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DbError> {
        let affected = match self.conn_mut()? {
            DatabaseConnection::Postgres(c) => bind_postgres(sqlx::query(sql), params)
                .execute(&mut *c)
                .await?
                .rows_affected(),
            DatabaseConnection::Sqlite(c) => bind_sqlite(sqlx::query(sql), params)
                .execute(&mut *c)
                .await?
                .rows_affected(),
        };
        Ok(affected)
    }

    /// Fetch a single integer, e.g. `SELECT COUNT(*) FROM proposals`.
    pub async fn query_scalar_i64(&mut self, sql: &str) -> Result<i64, DbError> {
        let value = match self.conn_mut()? {
            DatabaseConnection::Postgres(c) => {
                sqlx::query_scalar::<_, i64>(sql).fetch_one(&mut *c).await?
            }
            DatabaseConnection::Sqlite(c) => {
                sqlx::query_scalar::<_, i64>(sql).fetch_one(&mut *c).await?
            }
        };
        Ok(value)
    }

    /// Direct access for PostgreSQL-specific queries.
    pub fn as_postgres_mut(&mut self) -> Option<&mut PgConnection> {
        match self.conn.as_mut() {
            Some(DatabaseConnection::Postgres(c)) => Some(c),
            _ => None,
        }
    }

    /// Direct access for SQLite-specific queries.
    pub fn as_sqlite_mut(&mut self) -> Option<&mut SqliteConnection> {
        match self.conn.as_mut() {
            Some(DatabaseConnection::Sqlite(c)) => Some(c),
            _ => None,
        }
    }

    /// Close the connection. Closing twice is a no-op.
    pub async fn close(&mut self) -> Result<(), DbError> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        match conn {
            DatabaseConnection::Postgres(c) => c.close().await?,
            DatabaseConnection::Sqlite(c) => c.close().await?,
        }
        tracing::debug!(db = %self.target, "Closed database connection");
        Ok(())
    }
}

/// Opens database handles for invocations.
#[async_trait]
pub trait DatabaseConnector: Send + Sync + fmt::Debug {
    /// Connect to `target`, giving up after `timeout`.
    async fn connect(
        &self,
        target: &DatabaseTarget,
        timeout: Duration,
    ) -> Result<DatabaseHandle, DbError>;
}

/// The default connector, backed by sqlx.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlxConnector;

impl SqlxConnector {
    async fn open(target: &DatabaseTarget) -> Result<DatabaseConnection, DbError> {
        match target {
            DatabaseTarget::Durable { url } => {
                let options = PgConnectOptions::from_str(url)
                    .map_err(|e| DbError::InvalidUrl(e.to_string()))?;
                let conn = options
                    .connect()
                    .await
                    .map_err(|e| DbError::Connect(e.to_string()))?;
                Ok(DatabaseConnection::Postgres(conn))
            }
            DatabaseTarget::LocalFile { path } => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| DbError::Connect(format!("{}: {}", parent.display(), e)))?;
                }
                let conn = SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true)
                    .connect()
                    .await
                    .map_err(|e| DbError::Connect(e.to_string()))?;
                Ok(DatabaseConnection::Sqlite(conn))
            }
        }
    }
}

#[async_trait]
impl DatabaseConnector for SqlxConnector {
    async fn connect(
        &self,
        target: &DatabaseTarget,
        timeout: Duration,
    ) -> Result<DatabaseHandle, DbError> {
        let conn = tokio::time::timeout(timeout, Self::open(target))
            .await
            .map_err(|_| DbError::ConnectTimeout(timeout))??;

        tracing::debug!(db = %target, durable = target.is_durable(), "Connected to database");
        Ok(DatabaseHandle::new(target.clone(), conn))
    }
}
