//! Clock sources.
//!
//! Every time-sensitive computation in the crate reads timestamps from a
//! [`Clock`] and derives durations by subtraction, so a tick that arrives
//! late (or not at all) never biases a result. [`ManualClock`] lets tests
//! feed synthetic timestamps.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// `at` as wall-clock time in the user's timezone. Entry dates and the
    /// daily reset boundary are derived from this.
    fn to_local(&self, at: DateTime<Utc>) -> NaiveDateTime {
        at.with_timezone(&Local).naive_local()
    }

    fn local_now(&self) -> NaiveDateTime {
        self.to_local(self.now())
    }

    fn today(&self) -> NaiveDate {
        self.local_now().date()
    }
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Local time is the UTC wall time so tests are independent of the host
/// timezone.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// A clock parked at the given UTC wall time.
    pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Self {
        let start = Utc
            .with_ymd_and_hms(year, month, day, hour, minute, second)
            .single()
            .unwrap_or_else(Utc::now);
        Self::new(start)
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.lock() = to;
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance(Duration::seconds(secs));
    }

    pub fn advance_ms(&self, ms: i64) {
        self.advance(Duration::milliseconds(ms));
    }

    /// Negative durations move the clock backwards.
    pub fn advance(&self, by: Duration) {
        let mut now = self.lock();
        *now += by;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at(2025, 1, 6, 9, 0, 0)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.lock()
    }

    fn to_local(&self, at: DateTime<Utc>) -> NaiveDateTime {
        at.naive_utc()
    }
}

/// Milliseconds from `from` to `to`, clamped at zero.
///
/// A negative delta means the wall clock was adjusted backwards; it is
/// treated as no time having passed.
pub fn elapsed_ms_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    let delta = to.signed_duration_since(from).num_milliseconds();
    if delta < 0 {
        tracing::warn!(delta_ms = delta, "clock moved backwards, clamping elapsed time to zero");
        0
    } else {
        delta as u64
    }
}
