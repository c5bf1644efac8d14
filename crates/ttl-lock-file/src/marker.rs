//! Adjacent-marker backend: locks a specific file through a sibling `.lock` file.

use std::path::{Path, PathBuf};

use ttl_lock_core::error::{LockError, LockResult};
use ttl_lock_core::record::{LockRecord, ReadPolicy};
use ttl_lock_core::traits::LockBackend;

use crate::record_file::{self, run_blocking};

/// Answers "is this file locked" rather than "is this name locked".
///
/// The marker for `/data/report.csv` is `/data/report.csv.lock`, so every
/// process touching the same target file meets at the same marker,
/// regardless of any factory root. The lock name passed by the store is
/// ignored; only the target decides the marker.
#[derive(Debug, Clone)]
pub struct MarkerFileBackend {
    target: PathBuf,
    marker: PathBuf,
    read_policy: ReadPolicy,
}

impl MarkerFileBackend {
    /// Creates a backend guarding `target`.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::InvalidName`] if `target` has no file name.
    pub fn new(target: impl AsRef<Path>) -> LockResult<Self> {
        let target = std::path::absolute(target.as_ref()).map_err(|e| {
            LockError::InvalidName(format!(
                "cannot resolve '{}': {e}",
                target.as_ref().display()
            ))
        })?;
        let file_name = target.file_name().ok_or_else(|| {
            LockError::InvalidName(format!("'{}' does not name a file", target.display()))
        })?;

        let mut marker_name = file_name.to_os_string();
        marker_name.push(".lock");
        let marker = target.with_file_name(marker_name);

        Ok(Self {
            target,
            marker,
            read_policy: ReadPolicy::default(),
        })
    }

    /// Sets how unreadable marker files are treated.
    pub fn with_read_policy(mut self, policy: ReadPolicy) -> Self {
        self.read_policy = policy;
        self
    }

    /// The file being guarded.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// The marker file holding the record.
    pub fn marker(&self) -> &Path {
        &self.marker
    }

    /// Lock name for stores built on this backend.
    pub fn lock_name(&self) -> String {
        self.target.display().to_string()
    }
}

impl LockBackend for MarkerFileBackend {
    fn kind(&self) -> &'static str {
        "marker"
    }

    async fn read(&self, _name: &str) -> LockResult<Option<LockRecord>> {
        let marker = self.marker.clone();
        let policy = self.read_policy;
        run_blocking(move || record_file::read(&marker, policy)).await
    }

    async fn write(&self, _name: &str, record: &LockRecord, now: f64) -> LockResult<bool> {
        let marker = self.marker.clone();
        let record = record.clone();
        let policy = self.read_policy;
        run_blocking(move || record_file::write_if_admitted(&marker, &record, now, policy)).await
    }

    async fn clear(&self, _name: &str, owner: Option<&str>) -> LockResult<bool> {
        let marker = self.marker.clone();
        let owner = owner.map(str::to_owned);
        let policy = self.read_policy;
        run_blocking(move || record_file::clear(&marker, owner.as_deref(), policy)).await
    }
}
