//! The lock handle shared by every backend.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::OnceLock;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{Span, debug, field, instrument, warn};

use crate::error::{LockError, LockResult};
use crate::lease::{DEFAULT_LEASE, Lease};
use crate::owner;
use crate::poll::PollOptions;
use crate::record::{LockRecord, ReadPolicy, clock};
use crate::traits::LockBackend;

/// Per-store behavior that is not part of the record itself.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StoreOptions {
    /// How read failures are treated in decision paths.
    pub read_policy: ReadPolicy,
    /// Retry cadence for `block`.
    pub poll: PollOptions,
}

/// A named lock persisted through a [`LockBackend`].
///
/// Creating a store performs no I/O. Every operation consults the stored
/// record, so the observed state may change between calls when other
/// processes use the same name. Dropping a store never releases the lock;
/// call [`release`](Self::release) or let the lease expire.
///
/// # Example
///
/// ```rust,ignore
/// let lock = LockStore::new(backend, "job-42", Lease::For(Duration::from_secs(2)), Some("A"))?;
/// if lock.acquire().await {
///     run_job().await;
///     lock.release().await;
/// }
/// ```
pub struct LockStore<B> {
    name: String,
    lease: Lease,
    owner: OnceLock<String>,
    backend: B,
    options: StoreOptions,
}

impl<B: LockBackend> LockStore<B> {
    /// Creates a store for `name`.
    ///
    /// `Lease::Default` resolves to [`DEFAULT_LEASE`]; a missing or empty owner
    /// is generated on first use.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::InvalidName`] for an empty name.
    pub fn new(
        backend: B,
        name: impl Into<String>,
        lease: Lease,
        owner: Option<&str>,
    ) -> LockResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(LockError::InvalidName("lock name cannot be empty".to_string()));
        }

        let owner_cell = OnceLock::new();
        if let Some(owner) = owner::non_empty(owner) {
            let _ = owner_cell.set(owner.to_string());
        }

        Ok(Self {
            name,
            lease: lease.or(Lease::For(DEFAULT_LEASE)),
            owner: owner_cell,
            backend,
            options: StoreOptions::default(),
        })
    }

    /// Replaces the store options.
    pub fn with_options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The hold duration applied by each successful acquire.
    pub fn lease(&self) -> Lease {
        self.lease
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// The owner identifier this store claims locks with.
    pub fn owner(&self) -> &str {
        self.owner.get_or_init(owner::generate)
    }

    /// Attempts to take or renew the lock without waiting.
    ///
    /// Succeeds when the lock is free, expired, or already held by this
    /// owner (in which case the expiry is pushed forward). Under
    /// [`ReadPolicy::FailClosed`] the current record is read first, so an
    /// unreadable lock state is an error rather than an attempt.
    #[instrument(
        skip(self),
        fields(
            lock.name = %self.name,
            backend = self.backend.kind(),
            acquired = field::Empty,
        )
    )]
    pub async fn try_acquire(&self) -> LockResult<bool> {
        if !B::COORDINATES {
            return Ok(true);
        }

        if self.options.read_policy == ReadPolicy::FailClosed {
            self.read_current().await?;
        }

        let now = clock::now();
        let record = LockRecord::new(self.owner(), self.lease.until_from(now));
        let acquired = self.backend.write(&self.name, &record, now).await?;

        Span::current().record("acquired", acquired);
        if acquired {
            debug!(owner = %record.owner, until = record.until, "lock acquired");
        }
        Ok(acquired)
    }

    /// Attempts to take or renew the lock; backend failures count as "not acquired".
    pub async fn acquire(&self) -> bool {
        match self.try_acquire().await {
            Ok(acquired) => acquired,
            Err(e) => {
                warn!(
                    lock.name = %self.name,
                    backend = self.backend.kind(),
                    error = %e,
                    "acquire failed"
                );
                false
            }
        }
    }

    /// Returns the current non-expired record, whoever owns it.
    pub async fn holder(&self) -> LockResult<Option<LockRecord>> {
        if !B::COORDINATES {
            return Ok(None);
        }
        let record = self.read_current().await?;
        let now = clock::now();
        Ok(record.filter(|r| !r.is_free_at(now)))
    }

    /// Returns true if this owner currently holds an unexpired lock.
    pub async fn is_acquired(&self) -> bool {
        if !B::COORDINATES {
            return true;
        }
        match self.holder().await {
            Ok(Some(record)) => record.owner == self.owner(),
            Ok(None) => false,
            Err(e) => {
                warn!(lock.name = %self.name, error = %e, "could not read lock state");
                false
            }
        }
    }

    /// Time left on this owner's hold; zero if free, expired or held by someone else.
    pub async fn remaining_lifetime(&self) -> Duration {
        if !B::COORDINATES {
            return Duration::ZERO;
        }
        match self.holder().await {
            Ok(Some(record)) if record.owner == self.owner() => record.remaining_at(clock::now()),
            Ok(_) => Duration::ZERO,
            Err(e) => {
                warn!(lock.name = %self.name, error = %e, "could not read lock state");
                Duration::ZERO
            }
        }
    }

    /// Attempts to acquire the lock once, surfacing backend errors.
    pub async fn get(&self) -> LockResult<bool> {
        self.try_acquire().await
    }

    /// Attempts to acquire the lock once and runs `f` while holding it.
    ///
    /// Returns `Ok(None)` without calling `f` if the lock is held elsewhere.
    /// The lock is released after `f` completes, including when it panics
    /// (the panic resumes after the release). If the returned future is
    /// dropped while `f` runs, the lock is left to expire.
    pub async fn get_with<F, Fut, T>(&self, f: F) -> LockResult<Option<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if !self.try_acquire().await? {
            return Ok(None);
        }
        Ok(Some(self.run_scoped(f).await))
    }

    /// Polls for the lock until acquired or `wait` has elapsed.
    ///
    /// # Errors
    ///
    /// [`LockError::Timeout`] when the budget runs out, or the backend error
    /// that interrupted polling.
    pub async fn block(&self, wait: Duration) -> LockResult<()> {
        self.poll_acquire(wait, None).await
    }

    /// Like [`block`](Self::block), but gives up with [`LockError::Cancelled`]
    /// as soon as `cancel` observes `true`.
    pub async fn block_cancellable(
        &self,
        wait: Duration,
        cancel: watch::Receiver<bool>,
    ) -> LockResult<()> {
        self.poll_acquire(wait, Some(cancel)).await
    }

    /// Polls for the lock like [`block`](Self::block) and runs `f` while
    /// holding it, releasing afterwards as [`get_with`](Self::get_with) does.
    pub async fn block_with<F, Fut, T>(&self, wait: Duration, f: F) -> LockResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.block(wait).await?;
        Ok(self.run_scoped(f).await)
    }

    /// Releases the lock if this owner holds it.
    ///
    /// Returns `false` when the lock is free, expired, or owned by someone
    /// else; the stored record is left untouched in that case.
    #[instrument(
        skip(self),
        fields(
            lock.name = %self.name,
            backend = self.backend.kind(),
            released = field::Empty,
        )
    )]
    pub async fn release(&self) -> bool {
        if !B::COORDINATES {
            return true;
        }

        let owner = self.owner();
        match self.holder().await {
            Ok(Some(record)) if record.owner == owner => {}
            Ok(_) => {
                debug!("release skipped: lock not held by this owner");
                Span::current().record("released", false);
                return false;
            }
            Err(e) => {
                warn!(error = %e, "could not read lock state before release");
                return false;
            }
        }

        let released = match self.backend.clear(&self.name, Some(owner)).await {
            Ok(cleared) => cleared,
            Err(e) => {
                warn!(error = %e, "release failed");
                false
            }
        };
        Span::current().record("released", released);
        released
    }

    /// Clears the lock regardless of its owner.
    ///
    /// Meant for recovering from stuck holders. Failures are logged, never
    /// returned.
    #[instrument(skip(self), fields(lock.name = %self.name, backend = self.backend.kind()))]
    pub async fn force_release(&self) {
        if !B::COORDINATES {
            return;
        }
        match self.backend.clear(&self.name, None).await {
            Ok(_) => debug!("lock force-released"),
            Err(e) => warn!(error = %e, "force release failed"),
        }
    }

    async fn read_current(&self) -> LockResult<Option<LockRecord>> {
        match self.backend.read(&self.name).await {
            Ok(record) => Ok(record),
            Err(e) if self.options.read_policy == ReadPolicy::FailOpen => {
                warn!(
                    lock.name = %self.name,
                    error = %e,
                    "lock state unreadable, treating as free"
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn run_scoped<F, Fut, T>(&self, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let outcome = AssertUnwindSafe(async move { f().await }).catch_unwind().await;
        self.release().await;
        match outcome {
            Ok(value) => value,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    #[instrument(
        skip_all,
        fields(
            lock.name = %self.name,
            backend = self.backend.kind(),
            wait = ?wait,
            elapsed_ms = field::Empty,
        )
    )]
    async fn poll_acquire(
        &self,
        wait: Duration,
        mut cancel: Option<watch::Receiver<bool>>,
    ) -> LockResult<()> {
        if !B::COORDINATES {
            return Ok(());
        }

        let start = Instant::now();
        let mut backoff = self.options.poll.backoff();

        loop {
            if cancel.as_ref().is_some_and(|rx| *rx.borrow()) {
                return Err(LockError::Cancelled);
            }

            if self.try_acquire().await? {
                Span::current().record("elapsed_ms", start.elapsed().as_millis() as u64);
                return Ok(());
            }

            let elapsed = start.elapsed();
            if elapsed >= wait {
                debug!("lock not obtained in time");
                return Err(LockError::Timeout(wait));
            }

            let delay = backoff.next_delay(wait - elapsed);
            let mut sender_gone = false;
            match cancel.as_mut() {
                Some(rx) => {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        changed = rx.changed() => sender_gone = changed.is_err(),
                    }
                }
                None => tokio::time::sleep(delay).await,
            }
            if sender_gone {
                // nobody can cancel any more
                cancel = None;
            }
        }
    }
}

impl<B: LockBackend> fmt::Debug for LockStore<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockStore")
            .field("name", &self.name)
            .field("backend", &self.backend.kind())
            .field("lease", &self.lease)
            .field("owner", &self.owner.get())
            .finish()
    }
}
