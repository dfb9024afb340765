//! Calendar-minute min/max tracking shared by `SimpleTimer` and
//! `ConcurrentGauge`.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicI64, AtomicU64, Ordering},
};

use crate::clock::Clock;

const MINUTE_MILLIS: u64 = 60_000;

/// Running min/max for the current wall-clock minute plus the values
/// published for the previous one.
///
/// The hot path is a pair of atomic `fetch_min`/`fetch_max` calls. Only the
/// rollover takes the lock. An update racing a rollover is counted in the new
/// minute.
pub(crate) struct MinuteWindow {
    clock: Arc<dyn Clock>,
    minute: AtomicU64,
    current_min: AtomicI64,
    current_max: AtomicI64,
    previous_min: AtomicI64,
    previous_max: AtomicI64,
    roll: Mutex<()>,
}

impl MinuteWindow {
    pub(crate) fn new(clock: Arc<dyn Clock>, current: (i64, i64), previous: (i64, i64)) -> Self {
        let minute = clock.time_millis() / MINUTE_MILLIS;
        Self {
            clock,
            minute: AtomicU64::new(minute),
            current_min: AtomicI64::new(current.0),
            current_max: AtomicI64::new(current.1),
            previous_min: AtomicI64::new(previous.0),
            previous_max: AtomicI64::new(previous.1),
            roll: Mutex::new(()),
        }
    }

    /// Publish the accumulator if the minute has moved on.
    ///
    /// `neutral` is the (min, max) a fresh minute starts from. When more than
    /// one minute passed without updates the previous minute saw nothing
    /// either, so the neutral pair is published instead.
    pub(crate) fn roll_if_needed(&self, neutral: impl Fn() -> (i64, i64)) {
        let now = self.clock.time_millis() / MINUTE_MILLIS;
        if now <= self.minute.load(Ordering::Acquire) {
            return;
        }
        let _guard = self.roll.lock().unwrap_or_else(|e| e.into_inner());
        let stored = self.minute.load(Ordering::Acquire);
        if now <= stored {
            return;
        }
        let (reset_min, reset_max) = neutral();
        let (min, max) = if now == stored + 1 {
            (
                self.current_min.swap(reset_min, Ordering::AcqRel),
                self.current_max.swap(reset_max, Ordering::AcqRel),
            )
        } else {
            self.current_min.store(reset_min, Ordering::Release);
            self.current_max.store(reset_max, Ordering::Release);
            (reset_min, reset_max)
        };
        self.previous_min.store(min, Ordering::Release);
        self.previous_max.store(max, Ordering::Release);
        self.minute.store(now, Ordering::Release);
    }

    pub(crate) fn accumulate_min(&self, value: i64) {
        self.current_min.fetch_min(value, Ordering::AcqRel);
    }

    pub(crate) fn accumulate_max(&self, value: i64) {
        self.current_max.fetch_max(value, Ordering::AcqRel);
    }

    pub(crate) fn previous(&self) -> (i64, i64) {
        (
            self.previous_min.load(Ordering::Acquire),
            self.previous_max.load(Ordering::Acquire),
        )
    }
}
