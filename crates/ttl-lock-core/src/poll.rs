//! Retry cadence for blocking acquisition.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff settings used by `LockStore::block`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollOptions {
    /// Delay before the first retry.
    pub initial: Duration,
    /// Upper bound for a single delay.
    pub max: Duration,
    /// Growth factor applied after each failed attempt.
    pub multiplier: f64,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(10),
            max: Duration::from_millis(250),
            multiplier: 2.0,
        }
    }
}

impl PollOptions {
    /// A fixed delay between attempts.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial: delay,
            max: delay,
            multiplier: 1.0,
        }
    }

    pub(crate) fn backoff(&self) -> Backoff {
        Backoff {
            next: self.initial.min(self.max),
            options: *self,
        }
    }
}

/// Iterator-like state for successive poll delays.
#[derive(Debug)]
pub(crate) struct Backoff {
    next: Duration,
    options: PollOptions,
}

impl Backoff {
    /// Returns the next delay (with ±25% jitter), never exceeding `remaining`.
    pub(crate) fn next_delay(&mut self, remaining: Duration) -> Duration {
        let base = self.next;
        let factor = self.options.multiplier.max(1.0);
        let grown =
            Duration::try_from_secs_f64(base.as_secs_f64() * factor).unwrap_or(self.options.max);
        self.next = grown.min(self.options.max);

        // jitter keeps waiters from retrying in lockstep
        let quarter = base.as_micros() as u64 / 4;
        let jittered = if quarter > 0 {
            let offset = rand::thread_rng().gen_range(0..=quarter * 2);
            (base + Duration::from_micros(offset)).saturating_sub(Duration::from_micros(quarter))
        } else {
            base
        };
        jittered.min(remaining)
    }
}
