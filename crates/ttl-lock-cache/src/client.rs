//! The key/value collaborator consumed by [`CacheBackend`](crate::CacheBackend).

use std::future::Future;
use std::time::Duration;

use ttl_lock_core::error::LockResult;

/// Minimal key/value cache surface with atomic conditional updates.
///
/// Values are opaque strings. A `ttl` of `None` stores the entry without
/// native expiry. Implementations must make `add`, `compare_and_swap` and
/// `compare_and_delete` atomic with respect to every other client of the
/// same cache.
pub trait CacheClient: Send + Sync {
    /// Returns the live value for `key`.
    fn get(&self, key: &str) -> impl Future<Output = LockResult<Option<String>>> + Send;

    /// Stores `value` unconditionally.
    fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> impl Future<Output = LockResult<()>> + Send;

    /// Stores `value` only if `key` holds no live value. Returns `true` if stored.
    fn add(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> impl Future<Output = LockResult<bool>> + Send;

    /// Replaces the value only if it still equals `expected`.
    fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> impl Future<Output = LockResult<bool>> + Send;

    /// Removes `key`. Returns `true` if a live value was removed.
    fn delete(&self, key: &str) -> impl Future<Output = LockResult<bool>> + Send;

    /// Removes `key` only if its value still equals `expected`.
    fn compare_and_delete(
        &self,
        key: &str,
        expected: &str,
    ) -> impl Future<Output = LockResult<bool>> + Send;
}
