use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
};

use crate::{clock::Clock, window::MinuteWindow};

/// Number of parallel in-flight operations, with the lowest and highest
/// levels reached during the previous full minute.
pub struct ConcurrentGauge {
    count: AtomicI64,
    window: MinuteWindow,
}

impl ConcurrentGauge {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            count: AtomicI64::new(0),
            window: MinuteWindow::new(clock, (0, 0), (0, 0)),
        }
    }

    pub fn inc(&self) {
        self.roll();
        let current = self.count.fetch_add(1, Ordering::AcqRel) + 1;
        self.window.accumulate_max(current);
    }

    pub fn dec(&self) {
        self.roll();
        let current = self.count.fetch_sub(1, Ordering::AcqRel) - 1;
        self.window.accumulate_min(current);
    }

    /// The live level, independent of any minute window.
    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Acquire)
    }

    /// Highest level reached in the previous minute.
    pub fn max(&self) -> i64 {
        self.roll();
        self.window.previous().1
    }

    /// Lowest level reached in the previous minute.
    pub fn min(&self) -> i64 {
        self.roll();
        self.window.previous().0
    }

    fn roll(&self) {
        self.window.roll_if_needed(|| {
            let live = self.count();
            (live, live)
        });
    }
}

impl fmt::Debug for ConcurrentGauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentGauge")
            .field("count", &self.count())
            .finish_non_exhaustive()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::clock::ManualClock, std::time::Duration};

    #[test]
    fn reports_previous_minute_extremes() {
        let clock = Arc::new(ManualClock::starting_at(0));
        let gauge = ConcurrentGauge::new(clock.clone());
        gauge.inc();
        gauge.inc();
        gauge.inc();
        gauge.dec();
        assert_eq!(gauge.max(), 0);

        clock.advance(Duration::from_secs(60));
        assert_eq!(gauge.max(), 3);
        assert_eq!(gauge.min(), 0);
        assert_eq!(gauge.count(), 2);
    }

    #[test]
    fn quiet_minutes_report_the_live_level() {
        let clock = Arc::new(ManualClock::starting_at(0));
        let gauge = ConcurrentGauge::new(clock.clone());
        gauge.inc();
        gauge.inc();
        clock.advance(Duration::from_secs(180));
        assert_eq!(gauge.max(), 2);
        assert_eq!(gauge.min(), 2);
    }
}
