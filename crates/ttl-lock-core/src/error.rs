//! Error types for lock operations.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during lock operations.
#[derive(Error, Debug)]
pub enum LockError {
    /// Waiting for the lock exceeded the caller's budget.
    #[error("lock not obtained within {0:?}")]
    Timeout(Duration),

    /// The caller cancelled a blocking acquisition.
    #[error("lock acquisition was cancelled")]
    Cancelled,

    /// Invalid lock name.
    #[error("invalid lock name: {0}")]
    InvalidName(String),

    /// Invalid argument (negative duration, bad table name, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The storage medium could not be reached or opened.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The storage medium answered, but the operation failed.
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl LockError {
    /// Wraps an error raised while reaching the storage medium.
    pub fn unavailable(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::BackendUnavailable(err.into())
    }

    /// Wraps an error raised by the storage medium itself.
    pub fn backend(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Backend(err.into())
    }

    /// Returns true for errors caused by the storage medium rather than the caller.
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_) | Self::Backend(_))
    }
}

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;
