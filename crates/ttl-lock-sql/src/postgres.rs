//! PostgreSQL relational-row backend.

use std::fmt;
use std::sync::Arc;

use sqlx::Row;
use sqlx::postgres::{PgPool, Postgres};
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use ttl_lock_core::error::{LockError, LockResult};
use ttl_lock_core::record::LockRecord;
use ttl_lock_core::traits::LockBackend;

use crate::connection::{PoolSource, PostgresConnection, map_sqlx_error};
use crate::statements::{Placeholders, Statements};
use crate::table::{DEFAULT_TABLE, validate_table_name};

/// Builder for PostgreSQL backend configuration.
pub struct PostgresBackendBuilder {
    connection: Option<PostgresConnection>,
    table: String,
}

impl PostgresBackendBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            connection: None,
            table: DEFAULT_TABLE.to_string(),
        }
    }

    /// Sets the PostgreSQL connection string.
    pub fn connection_string(mut self, conn_str: impl Into<String>) -> Self {
        self.connection = Some(PostgresConnection::ConnectionString(conn_str.into()));
        self
    }

    /// Sets an existing connection pool.
    pub fn pool(mut self, pool: PgPool) -> Self {
        self.connection = Some(PostgresConnection::Pool(pool));
        self
    }

    /// Sets the table holding lock rows (default `locks`).
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Builds the backend. No connection is opened yet.
    pub fn build(self) -> LockResult<PostgresBackend> {
        let connection = self.connection.ok_or_else(|| {
            LockError::InvalidArgument("PostgreSQL connection not specified".to_string())
        })?;
        let table = validate_table_name(&self.table)?;

        Ok(PostgresBackend {
            source: Arc::new(connection.into_source()?),
            statements: Arc::new(Statements::new(
                table,
                "DOUBLE PRECISION",
                Placeholders::Numbered,
            )),
            table: table.to_string(),
            pool: Arc::new(OnceCell::new()),
        })
    }
}

impl Default for PostgresBackendBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Stores one row per lock name in a PostgreSQL table.
///
/// Same row layout and upsert as the SQLite backend; the row lock taken by
/// `INSERT ... ON CONFLICT` serializes competing writers.
#[derive(Clone)]
pub struct PostgresBackend {
    source: Arc<PoolSource<Postgres>>,
    statements: Arc<Statements>,
    table: String,
    pool: Arc<OnceCell<PgPool>>,
}

impl PostgresBackend {
    /// Returns a new builder for configuring the backend.
    pub fn builder() -> PostgresBackendBuilder {
        PostgresBackendBuilder::new()
    }

    /// Creates a backend using the specified connection string.
    pub fn new(connection_string: impl Into<String>) -> LockResult<Self> {
        Self::builder().connection_string(connection_string).build()
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    async fn pool(&self) -> LockResult<&PgPool> {
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

impl LockBackend for PostgresBackend {
    fn kind(&self) -> &'static str {
        "postgres"
    }

    #[instrument(level = "trace", skip(self), fields(backend = "postgres", table = %self.table))]
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
            backend = "postgres",
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

    #[instrument(level = "trace", skip(self), fields(backend = "postgres", table = %self.table))]
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

impl fmt::Debug for PostgresBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresBackend")
            .field("table", &self.table)
            .field("connected", &self.pool.initialized())
            .finish()
    }
}
