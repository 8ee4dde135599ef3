//! Time sources and monotonic request/event timestamps.

use chrono::{DateTime, Datelike, FixedOffset, Local, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Shared handle to a clock.
pub type SharedClock = Arc<dyn Clock>;

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Used by tests and the CLI dry runs.
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

    /// Start at a fixed instant (2024-01-01T00:00:00Z).
    pub fn at_epoch() -> Self {
        Self::new(Utc.timestamp_opt(1_704_067_200, 0).single().unwrap_or_default())
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }

    pub fn advance(&self, by: Duration) {
        let delta = chrono::Duration::milliseconds(by.as_millis() as i64);
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Time fields attached to every request and event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeMetrics {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Local hour of day, 0..=23.
    pub hour: u32,
    /// Local day of week, 0 = Sunday.
    pub dow: u32,
    /// Local offset from UTC in minutes.
    pub tz: i32,
}

impl TimeMetrics {
    pub fn from_millis(timestamp: i64, offset: FixedOffset) -> Self {
        let local = offset
            .timestamp_millis_opt(timestamp)
            .single()
            .unwrap_or_else(|| Utc::now().with_timezone(&offset));

        Self {
            timestamp,
            hour: local.hour(),
            dow: local.weekday().num_days_from_sunday(),
            tz: offset.local_minus_utc() / 60,
        }
    }
}

/// Produces strictly increasing millisecond timestamps.
///
/// When the clock returns a value at or before the previous stamp, the
/// previous stamp is bumped forward by 1 ms instead.
pub struct Timestamper {
    clock: SharedClock,
    offset: FixedOffset,
    last: Mutex<i64>,
}

impl Timestamper {
    /// Use the host's current local offset.
    pub fn new(clock: SharedClock) -> Self {
        let offset = *Local::now().offset();
        Self::with_offset(clock, offset)
    }

    pub fn with_offset(clock: SharedClock, offset: FixedOffset) -> Self {
        Self {
            clock,
            offset,
            last: Mutex::new(i64::MIN),
        }
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Current time, without the monotonic adjustment.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Next unique timestamp.
    pub fn next(&self) -> TimeMetrics {
        let mut ms = self.clock.now().timestamp_millis();
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if ms <= *last {
            ms = *last + 1;
        }
        *last = ms;
        TimeMetrics::from_millis(ms, self.offset)
    }
}

impl std::fmt::Debug for Timestamper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timestamper")
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}
