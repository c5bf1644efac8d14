//! Core traits for TTL locks.

use std::future::Future;
use std::sync::Arc;

use crate::error::LockResult;
use crate::lease::Lease;
use crate::record::LockRecord;
use crate::store::LockStore;

// ============================================================================
// Storage Backend Trait
// ============================================================================

/// A storage medium that persists one [`LockRecord`] per lock name.
///
/// Backends hold no in-process lock state; every decision is made against
/// the stored record so that separate processes and hosts coordinate through
/// the medium alone.
///
/// # Example
///
/// ```rust,ignore
/// let now = clock::now();
/// let record = LockRecord::new("worker-1", now + 5.0);
/// if backend.write("job-42", &record, now).await? {
///     // worker-1 holds job-42 for five seconds
/// }
/// ```
pub trait LockBackend: Send + Sync {
    /// Whether this backend actually coordinates anything.
    ///
    /// Only the no-op backend sets this to `false`, which makes every
    /// [`LockStore`] operation succeed without touching storage.
    const COORDINATES: bool = true;

    /// Short identifier used in logs ("file", "sqlite", ...).
    fn kind(&self) -> &'static str;

    /// Returns the stored record for `name`, or `None` if there is none.
    ///
    /// Expired records may still be returned; callers check
    /// [`LockRecord::is_free_at`].
    fn read(&self, name: &str) -> impl Future<Output = LockResult<Option<LockRecord>>> + Send;

    /// Stores `record` for `name` if the current record is free at `now` or
    /// already owned by `record.owner`.
    ///
    /// The check and the write happen atomically with respect to other
    /// writers. Returns `true` iff the write took effect.
    fn write(
        &self,
        name: &str,
        record: &LockRecord,
        now: f64,
    ) -> impl Future<Output = LockResult<bool>> + Send;

    /// Removes the record for `name`.
    ///
    /// With `Some(owner)` the record is removed only while it still names that
    /// owner; with `None` it is removed unconditionally. Returns `true` if a
    /// record was removed.
    fn clear(&self, name: &str, owner: Option<&str>)
    -> impl Future<Output = LockResult<bool>> + Send;
}

impl<B: LockBackend> LockBackend for Arc<B> {
    const COORDINATES: bool = B::COORDINATES;

    fn kind(&self) -> &'static str {
        (**self).kind()
    }

    fn read(&self, name: &str) -> impl Future<Output = LockResult<Option<LockRecord>>> + Send {
        (**self).read(name)
    }

    fn write(
        &self,
        name: &str,
        record: &LockRecord,
        now: f64,
    ) -> impl Future<Output = LockResult<bool>> + Send {
        (**self).write(name, record, now)
    }

    fn clear(
        &self,
        name: &str,
        owner: Option<&str>,
    ) -> impl Future<Output = LockResult<bool>> + Send {
        (**self).clear(name, owner)
    }
}

// ============================================================================
// Provider Trait
// ============================================================================

/// Hands out lock stores bound to one backend.
///
/// Providers carry the defaults (duration, owner) so application code only
/// names the lock.
///
/// ```rust,ignore
/// let lock = provider.lock("nightly-report", Lease::Default, None)?;
/// if lock.acquire().await {
///     build_report().await;
///     lock.release().await;
/// }
/// ```
pub trait LockProvider: Send + Sync {
    /// The backend the created stores persist through.
    type Backend: LockBackend;

    /// Creates a lock store for `name`; `Lease::Default` and a missing owner
    /// are filled from the provider's defaults.
    fn lock(
        &self,
        name: &str,
        lease: Lease,
        owner: Option<&str>,
    ) -> LockResult<LockStore<Self::Backend>>;
}
