//! Time sources for the time-dependent metric kinds.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

/// A source of monotonic ticks and wall-clock time.
pub trait Clock: Send + Sync {
    /// Monotonic time in nanoseconds. Only differences are meaningful.
    fn tick(&self) -> u64;

    /// Wall-clock time in milliseconds since the Unix epoch.
    fn time_millis(&self) -> u64;
}

/// The process clock.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// A shared handle suitable for handing to metrics.
    #[must_use]
    pub fn shared() -> Arc<dyn Clock> {
        Arc::new(Self::new())
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn tick(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    fn time_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to.
///
/// Ticks and wall-clock time advance together, so a test can move a metric
/// across a rate tick or a minute boundary with one call.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
    epoch_millis: u64,
}

impl ManualClock {
    /// Start at the given wall-clock time (milliseconds since the epoch).
    #[must_use]
    pub fn starting_at(epoch_millis: u64) -> Self {
        Self {
            nanos: AtomicU64::new(0),
            epoch_millis,
        }
    }

    pub fn advance(&self, by: Duration) {
        self.nanos
            .fetch_add(u64::try_from(by.as_nanos()).unwrap_or(u64::MAX), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn tick(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst)
    }

    fn time_millis(&self) -> u64 {
        self.epoch_millis + self.nanos.load(Ordering::SeqCst) / 1_000_000
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_ticks_and_wall_time_together() {
        let clock = ManualClock::starting_at(120_000);
        clock.advance(Duration::from_secs(61));
        assert_eq!(clock.tick(), 61_000_000_000);
        assert_eq!(clock.time_millis(), 181_000);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.tick();
        let b = clock.tick();
        assert!(b >= a);
        assert!(clock.time_millis() > 0);
    }
}
