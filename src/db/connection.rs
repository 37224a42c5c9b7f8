//! Connection Provider.
//!
//! Each request opens one dedicated connection, runs introspection and the
//! generated statement on it, and closes it. There is no pool: nothing is
//! shared between requests.

use crate::db::{executor, schema};
use crate::error::{PipelineResult, QueryError};
use crate::models::{DatabaseTarget, Dialect, Row, SchemaDescription};
use async_trait::async_trait;
use sqlx::mysql::MySqlConnectOptions;
use sqlx::postgres::PgConnectOptions;
use sqlx::{Connection, Executor, MySqlConnection, PgConnection};
use std::str::FromStr;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Default time allowed for establishing a connection.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Rows fetched by one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    pub rows: Vec<Row>,
    /// More rows were available than the requested limit
    pub truncated: bool,
}

/// An open, read-only database session scoped to one request.
#[async_trait]
pub trait SqlSession: Send {
    fn dialect(&self) -> Dialect;

    /// Enumerate tables and their columns.
    async fn describe_schema(&mut self) -> PipelineResult<SchemaDescription>;

    /// Run a statement and collect at most `row_limit` rows.
    async fn fetch_rows(&mut self, sql: &str, row_limit: u32) -> PipelineResult<RowSet>;

    /// Release the underlying connection. Safe to call more than once.
    async fn close(&mut self);
}

/// Opens sessions for database targets.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    async fn open(&self, target: &DatabaseTarget) -> PipelineResult<Box<dyn SqlSession>>;
}

/// Dialect-specific connection.
#[derive(Debug)]
pub enum DbConnection {
    MySql(MySqlConnection),
    Postgres(PgConnection),
}

impl DbConnection {
    pub fn dialect(&self) -> Dialect {
        match self {
            DbConnection::MySql(_) => Dialect::MySql,
            DbConnection::Postgres(_) => Dialect::Postgres,
        }
    }

    /// Gracefully terminate the connection.
    pub async fn close(self) -> Result<(), sqlx::Error> {
        match self {
            DbConnection::MySql(conn) => conn.close().await,
            DbConnection::Postgres(conn) => conn.close().await,
        }
    }
}

/// Connection provider backed by sqlx.
#[derive(Debug, Clone)]
pub struct SqlxConnectionProvider {
    connect_timeout: Duration,
}

impl SqlxConnectionProvider {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    async fn connect(&self, target: &DatabaseTarget) -> PipelineResult<DbConnection> {
        let url = target.connection_string()?;

        match target.dialect {
            Dialect::Postgres => {
                let options = PgConnectOptions::from_str(&url)
                    .map_err(|e| {
                        QueryError::connection(
                            format!("Invalid PostgreSQL connection string: {}", e),
                            "Check host, user and database name",
                        )
                    })?
                    .options([("default_transaction_read_only", "on")]);

                let conn = self
                    .with_timeout(PgConnection::connect_with(&options), target.dialect)
                    .await?;
                Ok(DbConnection::Postgres(conn))
            }
            Dialect::MySql => {
                let options = MySqlConnectOptions::from_str(&url)
                    .map_err(|e| {
                        QueryError::connection(
                            format!("Invalid MySQL connection string: {}", e),
                            "Check host, user and database name",
                        )
                    })?
                    .charset("utf8mb4");

                let mut conn = self
                    .with_timeout(MySqlConnection::connect_with(&options), target.dialect)
                    .await?;

                // MySQL has no startup option for this; set it before anything else runs.
                if let Err(e) = (&mut conn).execute("SET SESSION TRANSACTION READ ONLY").await {
                    let _ = conn.close().await;
                    return Err(QueryError::from_connect(e, target.dialect));
                }
                Ok(DbConnection::MySql(conn))
            }
        }
    }

    async fn with_timeout<C>(
        &self,
        connect: impl Future<Output = Result<C, sqlx::Error>>,
        dialect: Dialect,
    ) -> PipelineResult<C> {
        match timeout(self.connect_timeout, connect).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => Err(QueryError::from_connect(e, dialect)),
            Err(_) => Err(QueryError::connection(
                format!(
                    "Connection timed out after {}s",
                    self.connect_timeout.as_secs()
                ),
                format!("Check that the {} server is reachable", dialect),
            )),
        }
    }
}

impl Default for SqlxConnectionProvider {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
    }
}

#[async_trait]
impl ConnectionProvider for SqlxConnectionProvider {
    async fn open(&self, target: &DatabaseTarget) -> PipelineResult<Box<dyn SqlSession>> {
        let masked = target.masked_connection_string();
        debug!(database = %masked, dialect = %target.dialect, "Opening database session");

        let conn = self.connect(target).await?;
        info!(database = %masked, dialect = %target.dialect, "Database session opened");

        Ok(Box::new(DbSession {
            dialect: target.dialect,
            conn: Some(conn),
            masked_target: masked,
        }))
    }
}

/// Session over a single sqlx connection.
pub struct DbSession {
    dialect: Dialect,
    conn: Option<DbConnection>,
    masked_target: String,
}

impl DbSession {
    fn conn(&mut self) -> PipelineResult<&mut DbConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| QueryError::internal("Database session already closed"))
    }
}

#[async_trait]
impl SqlSession for DbSession {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn describe_schema(&mut self) -> PipelineResult<SchemaDescription> {
        schema::describe(self.conn()?).await
    }

    async fn fetch_rows(&mut self, sql: &str, row_limit: u32) -> PipelineResult<RowSet> {
        executor::fetch_rows(self.conn()?, sql, row_limit).await
    }

    async fn close(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        match conn.close().await {
            Ok(()) => debug!(database = %self.masked_target, "Database session closed"),
            Err(e) => warn!(
                database = %self.masked_target,
                error = %e,
                "Error while closing database session"
            ),
        }
    }
}

impl Drop for DbSession {
    fn drop(&mut self) {
        if self.conn.is_some() {
            // The socket is still released when the connection drops, just not gracefully.
            warn!(
                database = %self.masked_target,
                "Database session dropped without close()"
            );
        }
    }
}
