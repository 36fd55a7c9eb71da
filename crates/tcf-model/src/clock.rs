//! Injectable time source
//!
//! Sliding windows and audit timestamps read time through [`Clock`] so tests
//! can roll windows over without sleeping.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use parking_lot::Mutex;

/// Source of the current time
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current UTC time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests and simulations
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Clock frozen at `start`
    #[inline]
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    /// Jump to an absolute time
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Fixed-width RFC 3339 timestamp
///
/// Millisecond precision with a `Z` suffix, so lexicographic order of the
/// strings matches chronological order.
#[inline]
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn manual_clock_advances() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        clock.advance(Duration::hours(1));
        assert_eq!(clock.now(), start + Duration::hours(1));
    }

    #[test]
    fn timestamp_format_is_fixed_width() {
        let at = DateTime::parse_from_rfc3339("2025-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_timestamp(at), "2025-01-02T03:04:05.000Z");
    }

    proptest! {
        #[test]
        fn prop_timestamp_order_matches_time_order(a in 0i64..4_000_000_000_000, b in 0i64..4_000_000_000_000) {
            let ta = DateTime::from_timestamp_millis(a).unwrap();
            let tb = DateTime::from_timestamp_millis(b).unwrap();
            prop_assert_eq!(ta.cmp(&tb), format_timestamp(ta).cmp(&format_timestamp(tb)));
        }
    }
}
