//! Wall-clock source for test case timing.
//!
//! Durations are whole seconds between two readings of the same clock. The
//! plugin reads time through [`Clock`] so runs can be replayed with
//! deterministic timestamps.

use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// A source of wall-clock time.
pub trait Clock: Send + Sync + Debug {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Used by event replay (timestamps come from the recording) and by tests.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// Moves the clock forward by `secs` seconds.
    pub fn advance_secs(&self, secs: i64) {
        let mut current = self.current.lock();
        *current += Duration::seconds(secs);
    }

    /// Sets the clock to `at`. Moving backwards is ignored.
    pub fn set(&self, at: DateTime<Utc>) {
        let mut current = self.current.lock();
        if at > *current {
            *current = at;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock()
    }
}

/// Whole seconds elapsed from `start` to `end`, clamped at zero.
pub fn elapsed_secs(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    u64::try_from((end - start).num_seconds()).unwrap_or(0)
}

/// Formats a second count as `HH:MM:SS`.
///
/// Hours wrap at 24 like a time-of-day rendering of the elapsed span.
pub fn format_hms(secs: u64) -> String {
    let secs = secs % 86_400;
    format!(
        "{:02}:{:02}:{:02}",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}
