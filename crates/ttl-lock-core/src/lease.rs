//! Requested hold durations.

use std::time::Duration;

use crate::error::{LockError, LockResult};
use crate::record::LockRecord;

/// Hold duration used when neither the caller nor a factory supplies one.
pub const DEFAULT_LEASE: Duration = Duration::from_secs(30);

/// How long an acquired lock stays valid without renewal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lease {
    /// Use the factory (or crate) default.
    #[default]
    Default,
    /// Expire this long after each successful acquire.
    For(Duration),
    /// Never expire; only `release`/`force_release` frees the lock.
    Forever,
}

impl Lease {
    /// Interprets a duration in seconds: `0` selects the default.
    ///
    /// # Errors
    ///
    /// Negative and non-finite values are rejected, as are values too large
    /// for a [`Duration`] and positive values below one nanosecond.
    pub fn from_secs_f64(secs: f64) -> LockResult<Self> {
        if secs == 0.0 {
            return Ok(Self::Default);
        }
        let invalid = || {
            LockError::InvalidArgument(format!(
                "lock duration must be a positive number of seconds, got {secs}"
            ))
        };
        if !secs.is_finite() || secs < 0.0 {
            return Err(invalid());
        }
        match Duration::try_from_secs_f64(secs) {
            Ok(duration) if !duration.is_zero() => Ok(Self::For(duration)),
            _ => Err(invalid()),
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }

    /// Replaces `Default` with `fallback`.
    pub fn or(self, fallback: Lease) -> Lease {
        match self {
            Self::Default => fallback,
            other => other,
        }
    }

    /// Computes the `until` value of a hold starting at `now`.
    pub fn until_from(&self, now: f64) -> f64 {
        match self {
            Self::Default => now + DEFAULT_LEASE.as_secs_f64(),
            Self::For(d) => now + d.as_secs_f64(),
            Self::Forever => LockRecord::NEVER_EXPIRES,
        }
    }
}

impl From<Duration> for Lease {
    fn from(duration: Duration) -> Self {
        if duration.is_zero() {
            Self::Default
        } else {
            Self::For(duration)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_means_default() {
        assert_eq!(Lease::from_secs_f64(0.0).unwrap(), Lease::Default);
        assert_eq!(Lease::from(Duration::ZERO), Lease::Default);
    }

    #[test]
    fn negative_is_rejected() {
        assert!(matches!(
            Lease::from_secs_f64(-1.0),
            Err(LockError::InvalidArgument(_))
        ));
        assert!(Lease::from_secs_f64(f64::NAN).is_err());
    }

    #[test]
    fn out_of_range_is_rejected() {
        assert!(matches!(
            Lease::from_secs_f64(1e30),
            Err(LockError::InvalidArgument(_))
        ));
        assert!(matches!(
            Lease::from_secs_f64(1e-12),
            Err(LockError::InvalidArgument(_))
        ));
        assert_eq!(
            Lease::from_secs_f64(0.5).unwrap(),
            Lease::For(Duration::from_millis(500))
        );
    }

    #[test]
    fn fallback_only_replaces_default() {
        let fallback = Lease::For(Duration::from_secs(9));
        assert_eq!(Lease::Default.or(fallback), fallback);
        assert_eq!(Lease::Forever.or(fallback), Lease::Forever);
    }

    #[test]
    fn until_is_relative_to_now() {
        let lease = Lease::from_secs_f64(2.5).unwrap();
        assert_eq!(lease.until_from(100.0), 102.5);
        assert_eq!(Lease::Forever.until_from(100.0), LockRecord::NEVER_EXPIRES);
    }
}
