//! Cache-entry backends for TTL locks.
//!
//! [`CacheBackend`] works over any [`CacheClient`]. Two clients ship with the
//! crate: [`MemoryCache`] for a single process and [`RedisCache`] for
//! coordinating across hosts.
//!
//! # Example
//!
//! ```rust,no_run
//! use ttl_lock_cache::{CacheBackend, RedisCache};
//! use ttl_lock_core::prelude::*;
//!
//! # async fn example() -> LockResult<()> {
//! let cache = RedisCache::new("redis://localhost:6379").await?;
//! let lock = LockStore::new(CacheBackend::new(cache), "invoice-run", Lease::Default, None)?;
//! lock.get_with(|| async { /* exclusive work */ }).await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod client;
pub mod memory;
pub mod redis;

pub use backend::{CacheBackend, DEFAULT_PREFIX};
pub use client::CacheClient;
pub use memory::MemoryCache;
pub use redis::RedisCache;
