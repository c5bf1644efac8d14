//! SQLite relational-row backend.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sqlx::Row;
use sqlx::sqlite::{Sqlite, SqlitePool};
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use ttl_lock_core::error::{LockError, LockResult};
use ttl_lock_core::record::LockRecord;
use ttl_lock_core::traits::LockBackend;

use crate::connection::{PoolSource, SqliteConnection, map_sqlx_error};
use crate::statements::{Placeholders, Statements};
use crate::table::{DEFAULT_TABLE, validate_table_name};

/// Database file name used when only a directory is configured.
pub const DEFAULT_DATABASE_FILE: &str = "sqlocks.db3";

/// Builder for SQLite backend configuration.
pub struct SqliteBackendBuilder {
    connection: Option<SqliteConnection>,
    table: String,
    busy_timeout: Duration,
}

impl SqliteBackendBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            connection: None,
            table: DEFAULT_TABLE.to_string(),
            busy_timeout: Duration::from_secs(5),
        }
    }

    /// Uses a database file, created on first use if missing.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.connection = Some(SqliteConnection::Path(path.into()));
        self
    }

    /// Sets a `sqlite:` connection string.
    pub fn connection_string(mut self, conn_str: impl Into<String>) -> Self {
        self.connection = Some(SqliteConnection::ConnectionString(conn_str.into()));
        self
    }

    /// Uses an existing connection pool.
    pub fn pool(mut self, pool: SqlitePool) -> Self {
        self.connection = Some(SqliteConnection::Pool(pool));
        self
    }

    /// Sets the table holding lock rows (default `locks`).
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Sets how long a statement waits on SQLite's own file lock.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Builds the backend. No connection is opened yet.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection is specified, the connection string
    /// does not parse, or the table name is not a plain identifier.
    pub fn build(self) -> LockResult<SqliteBackend> {
        let connection = self
            .connection
            .ok_or_else(|| {
                LockError::InvalidArgument("SQLite connection not specified".to_string())
            })?;
        let table = validate_table_name(&self.table)?;

        Ok(SqliteBackend {
            source: Arc::new(connection.into_source(self.busy_timeout)?),
            statements: Arc::new(Statements::new(table, "REAL", Placeholders::Question)),
            table: table.to_string(),
            pool: Arc::new(OnceCell::new()),
        })
    }
}

impl Default for SqliteBackendBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Stores one row per lock name in a SQLite table.
///
/// The table is created on first use. Conditional writes are a single
/// upsert statement, so SQLite's own write lock makes them atomic across
/// processes sharing the database file. Cloning shares the pool.
#[derive(Clone)]
pub struct SqliteBackend {
    source: Arc<PoolSource<Sqlite>>,
    statements: Arc<Statements>,
    table: String,
    pool: Arc<OnceCell<SqlitePool>>,
}

impl SqliteBackend {
    /// Returns a new builder for configuring the backend.
    pub fn builder() -> SqliteBackendBuilder {
        SqliteBackendBuilder::new()
    }

    /// Creates a backend for the database file at `path` using the default table.
    pub fn new(path: impl Into<PathBuf>) -> LockResult<Self> {
        Self::builder().path(path).build()
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Opens the pool and creates the table on first call.
    async fn pool(&self) -> LockResult<&SqlitePool> {
        self.pool
            .get_or_try_init(|| async {
                let pool = self.source.open();
                sqlx::query(&self.statements.create_table)
                    .execute(&pool)
                    .await
                    .map_err(map_sqlx_error)?;
                debug!(table = %self.table, "lock table ready");
                Ok::<_, LockError>(pool)
            })
            .await
    }
}

impl LockBackend for SqliteBackend {
    fn kind(&self) -> &'static str {
        "sqlite"
    }

    #[instrument(level = "trace", skip(self), fields(backend = "sqlite", table = %self.table))]
    async fn read(&self, name: &str) -> LockResult<Option<LockRecord>> {
        let pool = self.pool().await?;
        let row = sqlx::query(&self.statements.select)
            .bind(name)
            .fetch_optional(pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(|row| {
            Ok::<_, LockError>(LockRecord {
                owner: row.try_get("owner").map_err(map_sqlx_error)?,
                until: row.try_get("until").map_err(map_sqlx_error)?,
            })
        })
        .transpose()
    }

    #[instrument(
        level = "trace", skip(self, record),
        fields(
            backend = "sqlite",
            table = %self.table,
            owner = %record.owner,
        )
    )]
    async fn write(&self, name: &str, record: &LockRecord, now: f64) -> LockResult<bool> {
        let pool = self.pool().await?;
        let result = sqlx::query(&self.statements.upsert)
            .bind(name)
            .bind(record.owner.as_str())
            .bind(record.until)
            .bind(now)
            .execute(pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() == 1)
    }

    #[instrument(level = "trace", skip(self), fields(backend = "sqlite", table = %self.table))]
    async fn clear(&self, name: &str, owner: Option<&str>) -> LockResult<bool> {
        let pool = self.pool().await?;
        let query = match owner {
            Some(owner) => sqlx::query(&self.statements.delete_owned).bind(name).bind(owner),
            None => sqlx::query(&self.statements.delete).bind(name),
        };
        let result = query.execute(pool).await.map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }
}

impl fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("table", &self.table)
            .field("connected", &self.pool.initialized())
            .finish()
    }
}
