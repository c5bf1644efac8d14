//! A backend that disables locking.

use crate::error::LockResult;
use crate::record::LockRecord;
use crate::traits::LockBackend;

/// Never persists anything.
///
/// Stores built on this backend report every operation as successful, which
/// lets callers switch locking off (single-process deployments, tests)
/// without changing their code.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBackend;

impl LockBackend for NoopBackend {
    const COORDINATES: bool = false;

    fn kind(&self) -> &'static str {
        "noop"
    }

    async fn read(&self, _name: &str) -> LockResult<Option<LockRecord>> {
        Ok(None)
    }

    async fn write(&self, _name: &str, _record: &LockRecord, _now: f64) -> LockResult<bool> {
        Ok(false)
    }

    async fn clear(&self, _name: &str, _owner: Option<&str>) -> LockResult<bool> {
        Ok(false)
    }
}
