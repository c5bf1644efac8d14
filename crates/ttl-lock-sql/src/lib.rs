//! Relational-row backends for TTL locks.
//!
//! Each lock is one row `(name, owner, until)` in a table (default `locks`).
//! Acquisition is a single conditional upsert that only replaces a row that
//! is free, expired or already held by the caller.
//!
//! # Example
//!
//! ```rust,no_run
//! use ttl_lock_core::prelude::*;
//! use ttl_lock_sql::SqliteBackend;
//!
//! # async fn example() -> LockResult<()> {
//! let backend = SqliteBackend::new("/var/tmp/sqlocks.db3")?;
//! let lock = LockStore::new(backend, "nightly-report", Lease::Default, None)?;
//! if lock.try_acquire().await? {
//!     // exclusive work
//!     lock.release().await;
//! }
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod postgres;
pub mod sqlite;
mod statements;
pub mod table;

pub use connection::{PostgresConnection, SqliteConnection};
pub use postgres::{PostgresBackend, PostgresBackendBuilder};
pub use sqlite::{DEFAULT_DATABASE_FILE, SqliteBackend, SqliteBackendBuilder};
pub use table::DEFAULT_TABLE;
