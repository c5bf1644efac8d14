//! Reading and conditionally replacing a record file under an OS file lock.
//!
//! Every function here blocks; callers run them on the blocking pool.

use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use fd_lock::RwLock;
use tracing::debug;

use ttl_lock_core::error::{LockError, LockResult};
use ttl_lock_core::record::{LockRecord, ReadPolicy, decode_record};

/// Retries for transient errors while directories and files are being
/// created or removed concurrently.
const MAX_RETRIES: u32 = 1600;

/// Runs a blocking record file operation off the async runtime.
pub(crate) async fn run_blocking<T, F>(op: F) -> LockResult<T>
where
    F: FnOnce() -> LockResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(LockError::backend)?
}

/// Returns the record stored at `path`, `None` if the file is missing or empty.
pub(crate) fn read(path: &Path, policy: ReadPolicy) -> LockResult<Option<LockRecord>> {
    let file = match OpenOptions::new().read(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(unavailable(e, "open", path)),
    };

    let lock = RwLock::new(file);
    let guard = lock.read().map_err(|e| unavailable(e, "lock", path))?;
    let raw = read_all(&guard).map_err(|e| unavailable(e, "read", path))?;
    decode_record(&raw, policy)
}

/// Stores `record` at `path` if the current content admits its owner at `now`.
pub(crate) fn write_if_admitted(
    path: &Path,
    record: &LockRecord,
    now: f64,
    policy: ReadPolicy,
) -> LockResult<bool> {
    let encoded = record.encode()?;
    let file = open_for_update(path)?;
    let mut lock = RwLock::new(file);
    let mut guard = lock.write().map_err(|e| unavailable(e, "lock", path))?;

    let raw = read_all(&guard).map_err(|e| unavailable(e, "read", path))?;
    if let Some(current) = decode_record(&raw, policy)?
        && !current.admits(&record.owner, now)
    {
        debug!(path = %path.display(), holder = %current.owner, "record held by another owner");
        return Ok(false);
    }

    replace_contents(&mut guard, encoded.as_bytes()).map_err(|e| unavailable(e, "write", path))?;
    Ok(true)
}

/// Empties the record file.
///
/// With `Some(owner)` only a record naming that owner is cleared. The file
/// is truncated, not removed, so every contender keeps locking the same inode.
pub(crate) fn clear(path: &Path, owner: Option<&str>, policy: ReadPolicy) -> LockResult<bool> {
    let file = match OpenOptions::new().read(true).write(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(unavailable(e, "open", path)),
    };
    let mut lock = RwLock::new(file);
    let mut guard = lock.write().map_err(|e| unavailable(e, "lock", path))?;

    let raw = read_all(&guard).map_err(|e| unavailable(e, "read", path))?;
    if let Some(owner) = owner {
        match decode_record(&raw, policy)? {
            Some(current) if current.owner == owner => {}
            _ => return Ok(false),
        }
    } else if raw.is_empty() {
        return Ok(false);
    }

    replace_contents(&mut guard, b"").map_err(|e| unavailable(e, "truncate", path))?;
    Ok(true)
}

fn open_for_update(path: &Path) -> LockResult<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_directory(parent)?;
    }

    let mut retry_count = 0;
    loop {
        // Never truncate on open: a waiting process must not wipe a held record.
        let result = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path);

        match result {
            Ok(file) => return Ok(file),
            Err(e) if path.is_dir() => {
                return Err(LockError::InvalidName(format!(
                    "failed to create lock file '{}' because it is already the name of a directory: {e}",
                    path.display()
                )));
            }
            Err(e)
                if retry_count < MAX_RETRIES
                    && matches!(e.kind(), ErrorKind::PermissionDenied | ErrorKind::NotFound) =>
            {
                retry_count += 1;
            }
            Err(e) => return Err(unavailable(e, "open", path)),
        }
    }
}

fn ensure_directory(directory: &Path) -> LockResult<()> {
    let mut retry_count = 0;
    loop {
        match std::fs::create_dir_all(directory) {
            Ok(()) => return Ok(()),
            Err(e)
                if retry_count < MAX_RETRIES
                    && matches!(e.kind(), ErrorKind::PermissionDenied | ErrorKind::AlreadyExists) =>
            {
                retry_count += 1;
            }
            Err(e) => return Err(unavailable(e, "create directory", directory)),
        }
    }
}

fn read_all(mut file: &File) -> io::Result<Vec<u8>> {
    let mut raw = Vec::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut raw)?;
    Ok(raw)
}

fn replace_contents(file: &mut File, bytes: &[u8]) -> io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(bytes)?;
    file.sync_data()
}

fn unavailable(e: io::Error, action: &str, path: &Path) -> LockError {
    LockError::unavailable(io::Error::new(
        e.kind(),
        format!("failed to {action} lock file '{}': {e}", path.display()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_reads_as_absent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("none.lock");
        assert_eq!(read(&path, ReadPolicy::FailClosed).unwrap(), None);
        assert!(!clear(&path, None, ReadPolicy::FailClosed).unwrap());
    }

    #[test]
    fn write_creates_missing_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a").join("b").join("x.lock");
        let record = LockRecord::new("A", 100.0);
        assert!(write_if_admitted(&path, &record, 50.0, ReadPolicy::FailOpen).unwrap());
        assert_eq!(read(&path, ReadPolicy::FailClosed).unwrap(), Some(record));
    }

    #[test]
    fn write_respects_current_holder() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.lock");
        let a = LockRecord::new("A", 100.0);
        let b = LockRecord::new("B", 120.0);

        assert!(write_if_admitted(&path, &a, 50.0, ReadPolicy::FailOpen).unwrap());
        assert!(!write_if_admitted(&path, &b, 60.0, ReadPolicy::FailOpen).unwrap());
        assert!(write_if_admitted(&path, &b, 100.0, ReadPolicy::FailOpen).unwrap());
        assert_eq!(read(&path, ReadPolicy::FailOpen).unwrap(), Some(b));
    }

    #[test]
    fn clear_checks_owner_and_keeps_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.lock");
        let a = LockRecord::new("A", 100.0);
        write_if_admitted(&path, &a, 50.0, ReadPolicy::FailOpen).unwrap();

        assert!(!clear(&path, Some("B"), ReadPolicy::FailOpen).unwrap());
        assert!(clear(&path, Some("A"), ReadPolicy::FailOpen).unwrap());
        assert!(path.exists());
        assert_eq!(read(&path, ReadPolicy::FailOpen).unwrap(), None);
    }

    #[test]
    fn corrupt_content_follows_policy() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.lock");
        std::fs::write(&path, "not json").unwrap();
        let a = LockRecord::new("A", 100.0);

        assert!(write_if_admitted(&path, &a, 50.0, ReadPolicy::FailClosed).is_err());
        assert!(write_if_admitted(&path, &a, 50.0, ReadPolicy::FailOpen).unwrap());

        std::fs::write(&path, "not json").unwrap();
        assert!(clear(&path, None, ReadPolicy::FailClosed).unwrap());
    }

    #[test]
    fn directory_in_the_way_is_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("taken");
        std::fs::create_dir(&path).unwrap();
        let record = LockRecord::new("A", 1.0);
        let result = write_if_admitted(&path, &record, 0.0, ReadPolicy::FailOpen);
        assert!(matches!(result, Err(LockError::InvalidName(_))));
    }
}
