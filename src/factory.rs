//! Shared defaults for creating locks.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use tracing::debug;

use ttl_lock_cache::{CacheBackend, CacheClient};
use ttl_lock_core::error::{LockError, LockResult};
use ttl_lock_core::lease::{DEFAULT_LEASE, Lease};
use ttl_lock_core::noop::NoopBackend;
use ttl_lock_core::owner;
use ttl_lock_core::poll::PollOptions;
use ttl_lock_core::record::ReadPolicy;
use ttl_lock_core::store::{LockStore, StoreOptions};
use ttl_lock_core::traits::{LockBackend, LockProvider};
use ttl_lock_file::{FileBackend, MarkerFileBackend};
use ttl_lock_sql::{DEFAULT_DATABASE_FILE, DEFAULT_TABLE, PostgresBackend, SqliteBackend};

/// Builder for [`LockFactory`] configuration.
#[derive(Debug, Default)]
pub struct LockFactoryBuilder {
    root: Option<PathBuf>,
    lease: Option<Lease>,
    owner: Option<String>,
    read_policy: ReadPolicy,
    poll: PollOptions,
}

impl LockFactoryBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the directory for file locks and the default SQLite database
    /// (defaults to the system temp directory).
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Sets the lease used when a lock is created with [`Lease::Default`].
    pub fn lease(mut self, lease: Lease) -> Self {
        self.lease = Some(lease);
        self
    }

    /// Sets the default owner for every lock created by the factory.
    ///
    /// An empty string keeps per-lock owner generation.
    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Sets how storage read failures are treated.
    pub fn read_policy(mut self, policy: ReadPolicy) -> Self {
        self.read_policy = policy;
        self
    }

    /// Sets the retry cadence for blocking acquisition.
    pub fn poll(mut self, poll: PollOptions) -> Self {
        self.poll = poll;
        self
    }

    /// Builds the factory.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::InvalidArgument`] if the default lease is itself
    /// [`Lease::Default`] or a zero duration.
    pub fn build(self) -> LockResult<LockFactory> {
        let lease = match self.lease {
            None => Lease::For(DEFAULT_LEASE),
            Some(Lease::Default) => {
                return Err(LockError::InvalidArgument(
                    "factory lease must be a concrete duration or Forever".to_string(),
                ));
            }
            Some(Lease::For(d)) if d.is_zero() => {
                return Err(LockError::InvalidArgument(
                    "factory lease must be longer than zero".to_string(),
                ));
            }
            Some(lease) => lease,
        };

        Ok(LockFactory {
            root: self.root.unwrap_or_else(std::env::temp_dir),
            lease,
            owner: self.owner.filter(|o| !o.is_empty()),
            options: StoreOptions {
                read_policy: self.read_policy,
                poll: self.poll,
            },
            sqlite: Arc::new(OnceLock::new()),
        })
    }
}

/// Creates lock stores with shared defaults.
///
/// Every `create_*` method accepts [`Lease::Default`] and `None` (or an empty
/// owner) to take the factory's lease and owner. Creating a lock performs no
/// I/O. The factory is cheap to clone and never changes after construction.
///
/// ```rust,no_run
/// use ttl_lock::*;
///
/// # fn example() -> LockResult<()> {
/// let factory = LockFactory::builder().root("/var/lock/app").build()?;
/// let lock = factory.create_file_lock("reindex", Lease::Default, None)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LockFactory {
    root: PathBuf,
    lease: Lease,
    owner: Option<String>,
    options: StoreOptions,
    sqlite: Arc<OnceLock<SqliteBackend>>,
}

impl LockFactory {
    /// Returns a new builder for configuring the factory.
    pub fn builder() -> LockFactoryBuilder {
        LockFactoryBuilder::new()
    }

    /// Creates a factory rooted at `root` with default lease and owner.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_defaults(root.into())
    }

    fn with_defaults(root: PathBuf) -> Self {
        Self {
            root,
            lease: Lease::For(DEFAULT_LEASE),
            owner: None,
            options: StoreOptions::default(),
            sqlite: Arc::new(OnceLock::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The lease applied to locks created with [`Lease::Default`].
    pub fn lease(&self) -> Lease {
        self.lease
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Creates a lock on any backend, applying the factory defaults.
    pub fn create_lock<B: LockBackend>(
        &self,
        backend: B,
        name: &str,
        lease: Lease,
        owner: Option<&str>,
    ) -> LockResult<LockStore<B>> {
        let owner = owner::non_empty(owner).or(self.owner.as_deref());
        let store = LockStore::new(backend, name, lease.or(self.lease), owner)?
            .with_options(self.options);
        debug!(lock.name = name, backend = store.backend().kind(), "lock created");
        Ok(store)
    }

    /// Creates a file lock under the factory root.
    pub fn create_file_lock(
        &self,
        name: &str,
        lease: Lease,
        owner: Option<&str>,
    ) -> LockResult<LockStore<FileBackend>> {
        self.create_file_lock_in(&self.root, name, lease, owner)
    }

    /// Creates a file lock under `directory` instead of the factory root.
    pub fn create_file_lock_in(
        &self,
        directory: impl Into<PathBuf>,
        name: &str,
        lease: Lease,
        owner: Option<&str>,
    ) -> LockResult<LockStore<FileBackend>> {
        let backend = FileBackend::new(directory).with_read_policy(self.options.read_policy);
        self.create_lock(backend, name, lease, owner)
    }

    /// Locks `target` through a `.lock` file beside it.
    ///
    /// The lock is named after the absolute target path; the factory root is
    /// not involved.
    pub fn create_marker_lock(
        &self,
        target: impl AsRef<Path>,
        lease: Lease,
        owner: Option<&str>,
    ) -> LockResult<LockStore<MarkerFileBackend>> {
        let backend = MarkerFileBackend::new(target)?.with_read_policy(self.options.read_policy);
        let name = backend.lock_name();
        self.create_lock(backend, &name, lease, owner)
    }

    /// Builds a SQLite backend.
    ///
    /// `db_file` defaults to `sqlocks.db3` and is resolved against the factory
    /// root when relative; `table` defaults to `locks`.
    pub fn sqlite_backend(
        &self,
        db_file: Option<&Path>,
        table: Option<&str>,
    ) -> LockResult<SqliteBackend> {
        let path = self
            .root
            .join(db_file.unwrap_or(Path::new(DEFAULT_DATABASE_FILE)));
        SqliteBackend::builder()
            .path(path)
            .table(table.unwrap_or(DEFAULT_TABLE))
            .build()
    }

    /// Creates a lock in the factory's default SQLite database.
    ///
    /// Locks created this way share one connection pool.
    pub fn create_sqlite_lock(
        &self,
        name: &str,
        lease: Lease,
        owner: Option<&str>,
    ) -> LockResult<LockStore<SqliteBackend>> {
        let backend = match self.sqlite.get() {
            Some(backend) => backend.clone(),
            None => {
                let backend = self.sqlite_backend(None, None)?;
                self.sqlite.get_or_init(|| backend).clone()
            }
        };
        self.create_lock(backend, name, lease, owner)
    }

    /// Creates a lock stored in PostgreSQL.
    pub fn create_postgres_lock(
        &self,
        backend: &PostgresBackend,
        name: &str,
        lease: Lease,
        owner: Option<&str>,
    ) -> LockResult<LockStore<PostgresBackend>> {
        self.create_lock(backend.clone(), name, lease, owner)
    }

    /// Creates a lock kept as an entry in `client`.
    pub fn create_cache_lock<C: CacheClient>(
        &self,
        client: C,
        name: &str,
        lease: Lease,
        owner: Option<&str>,
    ) -> LockResult<LockStore<CacheBackend<C>>> {
        let backend = CacheBackend::new(client).with_read_policy(self.options.read_policy);
        self.create_lock(backend, name, lease, owner)
    }

    /// Creates a lock that always succeeds and coordinates nothing.
    pub fn create_no_lock(
        &self,
        name: &str,
        lease: Lease,
        owner: Option<&str>,
    ) -> LockResult<LockStore<NoopBackend>> {
        self.create_lock(NoopBackend, name, lease, owner)
    }

    /// Pairs the factory with one backend so it can be passed around as a
    /// [`LockProvider`].
    pub fn bind<B: LockBackend + Clone>(&self, backend: B) -> BoundFactory<B> {
        BoundFactory {
            factory: self.clone(),
            backend,
        }
    }
}

impl Default for LockFactory {
    fn default() -> Self {
        Self::with_defaults(std::env::temp_dir())
    }
}

/// A [`LockFactory`] tied to a single backend.
#[derive(Debug, Clone)]
pub struct BoundFactory<B> {
    factory: LockFactory,
    backend: B,
}

impl<B> BoundFactory<B> {
    pub fn factory(&self) -> &LockFactory {
        &self.factory
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: LockBackend + Clone> LockProvider for BoundFactory<B> {
    type Backend = B;

    fn lock(&self, name: &str, lease: Lease, owner: Option<&str>) -> LockResult<LockStore<B>> {
        self.factory
            .create_lock(self.backend.clone(), name, lease, owner)
    }
}
