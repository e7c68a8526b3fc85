//! Time sources and time expressions
//!
//! Authorization never reads the wall clock directly. Every decision that
//! depends on "now" goes through a [`PhysicalClock`] so tests can pin the
//! reference time and clock-skew leeway is applied against a single reading.

pub mod duration;
pub mod relative;

pub use duration::{format_duration, parse_duration, DurationParseError};
pub use relative::TimeDuration;

use chrono::{DateTime, Duration, Utc};
use std::sync::RwLock;

/// Source of the reference time used by authorization decisions
pub trait PhysicalClock: Send + Sync {
    /// Current reference time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time source
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl PhysicalClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Pinned time source for deterministic tests and replays
#[derive(Debug)]
pub struct FixedClock {
    current: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    /// Create a clock frozen at `at`
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            current: RwLock::new(at),
        }
    }

    /// Create a clock frozen at the given unix timestamp (seconds)
    pub fn at_unix(secs: i64) -> Self {
        Self::new(DateTime::from_timestamp(secs, 0).unwrap_or_default())
    }

    /// Move the clock to an absolute instant
    pub fn set(&self, at: DateTime<Utc>) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = at;
    }

    /// Move the clock forward (or backward, for negative durations)
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current += by;
    }
}

impl PhysicalClock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.read().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T: PhysicalClock + ?Sized> PhysicalClock for std::sync::Arc<T> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_is_pinned() {
        let clock = FixedClock::at_unix(1_700_000_000);
        assert_eq!(clock.now().timestamp(), 1_700_000_000);
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn test_fixed_clock_advance() {
        let clock = FixedClock::at_unix(1_700_000_000);
        clock.advance(Duration::minutes(2));
        assert_eq!(clock.now().timestamp(), 1_700_000_120);
        clock.advance(Duration::seconds(-20));
        assert_eq!(clock.now().timestamp(), 1_700_000_100);
    }

    #[test]
    fn test_arc_clock_delegates() {
        let clock = std::sync::Arc::new(FixedClock::at_unix(42));
        assert_eq!(PhysicalClock::now(&clock).timestamp(), 42);
    }
}
