//! Time-limited mutual exclusion locks for Rust with pluggable storage.
//!
//! A lock is a named record `{owner, until}` kept in some shared medium. Any
//! process that can reach the medium can take the lock when it is free or
//! expired, renew it while holding it, and release it. Holds expire on their
//! own, so a crashed holder blocks others for at most one lease.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use ttl_lock::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let factory = LockFactory::new("/tmp/locks");
//!     let lock = factory.create_file_lock("job-42", Lease::For(Duration::from_secs(2)), None)?;
//!
//!     // Wait up to five seconds, run the job, then release.
//!     let rows = lock
//!         .block_with(Duration::from_secs(5), || async { 42 })
//!         .await?;
//!     println!("processed {rows} rows");
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`FileBackend`]: one file per lock name in a directory.
//! - [`MarkerFileBackend`]: a `.lock` file next to the file being protected.
//! - [`SqliteBackend`] / [`PostgresBackend`]: one row per lock name.
//! - [`CacheBackend`]: one cache entry per lock name, over [`MemoryCache`],
//!   [`RedisCache`] or any [`CacheClient`].
//! - [`NoopBackend`]: every operation succeeds; locking switched off.
//!
//! # Crate Organization
//!
//! This crate re-exports:
//! - `ttl-lock-core`: the record, backend trait and [`LockStore`]
//! - `ttl-lock-file`: file and marker-file backends
//! - `ttl-lock-sql`: SQLite and PostgreSQL backends
//! - `ttl-lock-cache`: cache backends
//!
//! and adds [`LockFactory`], which fills in shared defaults.

pub mod factory;

pub use factory::{BoundFactory, LockFactory, LockFactoryBuilder};

// Re-export core types and traits
pub use ttl_lock_core::*;

pub use ttl_lock_cache::{CacheBackend, CacheClient, MemoryCache, RedisCache};
pub use ttl_lock_file::{FileBackend, MarkerFileBackend};
pub use ttl_lock_sql::{
    PostgresBackend, PostgresBackendBuilder, SqliteBackend, SqliteBackendBuilder,
};
