//! The persisted lock record and the wall clock it is compared against.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{LockError, LockResult};

/// The unit of state every backend stores for a lock name.
///
/// An empty owner or an `until` in the past both mean "free". Records are
/// compared against each participant's wall clock, so holders on different
/// machines rely on roughly synchronized clocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Opaque identifier of the holder.
    #[serde(default)]
    pub owner: String,
    /// Expiry instant in seconds since the Unix epoch.
    #[serde(default)]
    pub until: f64,
}

impl LockRecord {
    /// `until` value of a hold that never expires.
    pub const NEVER_EXPIRES: f64 = f64::MAX;

    pub fn new(owner: impl Into<String>, until: f64) -> Self {
        Self {
            owner: owner.into(),
            until,
        }
    }

    /// Returns true if nobody validly holds this record at `now`.
    pub fn is_free_at(&self, now: f64) -> bool {
        self.owner.is_empty() || self.until <= 0.0 || self.until <= now
    }

    /// Returns true if `owner` holds this record at `now`.
    pub fn is_held_by(&self, owner: &str, now: f64) -> bool {
        !self.is_free_at(now) && self.owner == owner
    }

    /// The free-or-self condition a conditional write must satisfy.
    pub fn admits(&self, owner: &str, now: f64) -> bool {
        self.is_free_at(now) || self.owner == owner
    }

    pub fn never_expires(&self) -> bool {
        self.until >= Self::NEVER_EXPIRES
    }

    /// Time left on the hold, zero when free.
    pub fn remaining_at(&self, now: f64) -> Duration {
        if self.is_free_at(now) {
            Duration::ZERO
        } else if self.never_expires() {
            Duration::MAX
        } else {
            Duration::try_from_secs_f64(self.until - now).unwrap_or(Duration::ZERO)
        }
    }

    /// Serializes the record for file and cache storage.
    pub fn encode(&self) -> LockResult<String> {
        serde_json::to_string(self).map_err(LockError::backend)
    }
}

/// How a record that cannot be read or decoded is treated.
///
/// Failing open favors availability: unreadable storage counts as a free lock.
/// Failing closed favors correctness: unreadable storage blocks acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadPolicy {
    #[default]
    FailOpen,
    FailClosed,
}

/// Decodes a stored record, applying `policy` to content that does not parse.
///
/// Empty content is an absent record.
pub fn decode_record(raw: &[u8], policy: ReadPolicy) -> LockResult<Option<LockRecord>> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    match serde_json::from_slice::<LockRecord>(raw) {
        Ok(record) => Ok(Some(record)),
        Err(e) => match policy {
            ReadPolicy::FailOpen => {
                warn!(error = %e, "unreadable lock record treated as absent");
                Ok(None)
            }
            ReadPolicy::FailClosed => Err(LockError::backend(format!(
                "unreadable lock record: {e}"
            ))),
        },
    }
}

/// Wall-clock helpers.
pub mod clock {
    use super::*;

    /// Current wall-clock time in seconds since the Unix epoch.
    pub fn now() -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_owner_and_zero_until_are_free() {
        assert!(LockRecord::new("", 10_000.0).is_free_at(5.0));
        assert!(LockRecord::new("a", 0.0).is_free_at(5.0));
        assert!(!LockRecord::new("a", 10.0).is_free_at(5.0));
    }

    #[test]
    fn expired_record_admits_anyone() {
        let record = LockRecord::new("a", 10.0);
        assert!(!record.admits("b", 9.0));
        assert!(record.admits("a", 9.0));
        assert!(record.admits("b", 10.0));
        assert!(!record.is_held_by("a", 11.0));
    }

    #[test]
    fn remaining_lifetime() {
        let record = LockRecord::new("a", 15.5);
        assert_eq!(record.remaining_at(10.0), Duration::from_secs_f64(5.5));
        assert_eq!(record.remaining_at(20.0), Duration::ZERO);

        let forever = LockRecord::new("a", LockRecord::NEVER_EXPIRES);
        assert_eq!(forever.remaining_at(clock::now()), Duration::MAX);
    }

    #[test]
    fn decode_respects_policy() {
        assert_eq!(decode_record(b"", ReadPolicy::FailClosed).unwrap(), None);
        assert_eq!(decode_record(b"garbage", ReadPolicy::FailOpen).unwrap(), None);
        assert!(decode_record(b"garbage", ReadPolicy::FailClosed).is_err());

        let raw = LockRecord::new("a", 12.0).encode().unwrap();
        let decoded = decode_record(raw.as_bytes(), ReadPolicy::FailClosed).unwrap();
        assert_eq!(decoded, Some(LockRecord::new("a", 12.0)));
    }

    #[test]
    fn forever_sentinel_survives_encoding() {
        let raw = LockRecord::new("a", LockRecord::NEVER_EXPIRES).encode().unwrap();
        let decoded = decode_record(raw.as_bytes(), ReadPolicy::FailClosed)
            .unwrap()
            .unwrap();
        assert!(decoded.never_expires());
    }
}
