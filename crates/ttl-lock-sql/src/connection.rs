//! Connection sources for the relational backends.
//!
//! Sources are parsed eagerly (so bad connection strings fail at build time)
//! but pools are only created on first use, inside the async runtime.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sqlx::pool::PoolOptions;
use sqlx::postgres::{PgConnectOptions, PgPool, Postgres};
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use sqlx::{Connection, Database, Pool};

use ttl_lock_core::error::{LockError, LockResult};

/// Where a SQLite backend gets its connections.
#[derive(Clone)]
pub enum SqliteConnection {
    /// A database file, created if missing.
    Path(PathBuf),
    /// A `sqlite:` connection string.
    ConnectionString(String),
    /// An existing connection pool.
    Pool(SqlitePool),
}

impl SqliteConnection {
    pub(crate) fn into_source(self, busy_timeout: Duration) -> LockResult<PoolSource<Sqlite>> {
        let options = match self {
            Self::Pool(pool) => return Ok(PoolSource::Existing(pool)),
            Self::Path(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true),
            Self::ConnectionString(url) => SqliteConnectOptions::from_str(&url).map_err(|e| {
                LockError::InvalidArgument(format!("invalid SQLite connection string: {e}"))
            })?,
        };

        Ok(PoolSource::Connect(
            options
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(busy_timeout),
        ))
    }
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "SqliteConnection::Path({})", path.display()),
            Self::ConnectionString(_) => {
                write!(f, "SqliteConnection::ConnectionString([REDACTED])")
            }
            Self::Pool(_) => write!(f, "SqliteConnection::Pool([POOL])"),
        }
    }
}

/// Where a PostgreSQL backend gets its connections.
#[derive(Clone)]
pub enum PostgresConnection {
    /// Connection string - the backend manages pooling.
    ConnectionString(String),
    /// External connection pool.
    Pool(PgPool),
}

impl PostgresConnection {
    pub(crate) fn into_source(self) -> LockResult<PoolSource<Postgres>> {
        match self {
            Self::ConnectionString(url) => PgConnectOptions::from_str(&url)
                .map(PoolSource::Connect)
                .map_err(|e| {
                    LockError::InvalidArgument(format!("invalid PostgreSQL connection string: {e}"))
                }),
            Self::Pool(pool) => Ok(PoolSource::Existing(pool)),
        }
    }
}

impl fmt::Debug for PostgresConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionString(_) => {
                write!(f, "PostgresConnection::ConnectionString([REDACTED])")
            }
            Self::Pool(_) => write!(f, "PostgresConnection::Pool([POOL])"),
        }
    }
}

/// Parsed connection options or a caller-provided pool.
pub(crate) enum PoolSource<DB: Database> {
    Connect(<DB::Connection as Connection>::Options),
    Existing(Pool<DB>),
}

impl<DB: Database> PoolSource<DB> {
    /// Returns a pool; no connection is opened until a query runs.
    pub(crate) fn open(&self) -> Pool<DB> {
        match self {
            Self::Connect(options) => PoolOptions::<DB>::new().connect_lazy_with(options.clone()),
            Self::Existing(pool) => pool.clone(),
        }
    }
}

/// Classifies a driver error: connectivity problems become
/// [`LockError::BackendUnavailable`], everything else [`LockError::Backend`].
pub(crate) fn map_sqlx_error(e: sqlx::Error) -> LockError {
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Configuration(_) => LockError::unavailable(e),
        other => LockError::backend(other),
    }
}
