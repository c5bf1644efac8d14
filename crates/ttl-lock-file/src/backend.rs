//! Local-file backend: one record file per lock name.

use std::path::{Path, PathBuf};

use tracing::instrument;

use ttl_lock_core::error::LockResult;
use ttl_lock_core::record::{LockRecord, ReadPolicy};
use ttl_lock_core::traits::LockBackend;

use crate::name::lock_file_path;
use crate::record_file::{self, run_blocking};

/// Stores lock records as files in a directory.
///
/// The file for a name is derived by [`lock_file_path`]. Check-and-write
/// happens under an exclusive OS file lock, so processes sharing the
/// directory (including over a network file system that honors `flock`)
/// coordinate through it.
#[derive(Debug, Clone)]
pub struct FileBackend {
    directory: PathBuf,
    read_policy: ReadPolicy,
}

impl FileBackend {
    /// Creates a backend rooted at `directory`.
    ///
    /// The directory is created on the first write, not here.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            read_policy: ReadPolicy::default(),
        }
    }

    /// Sets how unreadable record files are treated.
    pub fn with_read_policy(mut self, policy: ReadPolicy) -> Self {
        self.read_policy = policy;
        self
    }

    /// Returns the directory where record files are stored.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Returns the record file used for `name`.
    pub fn path_for(&self, name: &str) -> LockResult<PathBuf> {
        lock_file_path(&self.directory, name)
    }
}

impl LockBackend for FileBackend {
    fn kind(&self) -> &'static str {
        "file"
    }

    #[instrument(level = "trace", skip(self), fields(backend = "file"))]
    async fn read(&self, name: &str) -> LockResult<Option<LockRecord>> {
        let path = self.path_for(name)?;
        let policy = self.read_policy;
        run_blocking(move || record_file::read(&path, policy)).await
    }

    #[instrument(
        level = "trace", skip(self, record),
        fields(
            backend = "file",
            owner = %record.owner,
        )
    )]
    async fn write(&self, name: &str, record: &LockRecord, now: f64) -> LockResult<bool> {
        let path = self.path_for(name)?;
        let record = record.clone();
        let policy = self.read_policy;
        run_blocking(move || record_file::write_if_admitted(&path, &record, now, policy)).await
    }

    #[instrument(level = "trace", skip(self), fields(backend = "file"))]
    async fn clear(&self, name: &str, owner: Option<&str>) -> LockResult<bool> {
        let path = self.path_for(name)?;
        let owner = owner.map(str::to_owned);
        let policy = self.read_policy;
        run_blocking(move || record_file::clear(&path, owner.as_deref(), policy)).await
    }
}
