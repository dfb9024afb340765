use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use crate::{clock::Clock, histogram::Histogram, meter::Meter, snapshot::Snapshot};

/// Something that accepts measured durations.
pub trait RecordDuration {
    fn record(&self, elapsed: Duration);

    fn clock(&self) -> &dyn Clock;
}

/// A running measurement started by `Timer::start` or `SimpleTimer::start`.
///
/// Records exactly once: on [`TimerContext::stop`], or on drop if it was
/// never stopped (including during unwinding).
#[must_use = "dropping the context immediately records a near-zero duration"]
pub struct TimerContext<'a> {
    target: &'a dyn RecordDuration,
    started: u64,
    stopped: bool,
}

impl<'a> TimerContext<'a> {
    pub(crate) fn new(target: &'a dyn RecordDuration) -> Self {
        Self {
            target,
            started: target.clock().tick(),
            stopped: false,
        }
    }

    /// Stop and record, returning the measured duration.
    pub fn stop(mut self) -> Duration {
        self.finish()
    }

    fn finish(&mut self) -> Duration {
        let elapsed = Duration::from_nanos(self.target.clock().tick().saturating_sub(self.started));
        if !self.stopped {
            self.stopped = true;
            self.target.record(elapsed);
        }
        elapsed
    }
}

impl Drop for TimerContext<'_> {
    fn drop(&mut self) {
        if !self.stopped {
            self.finish();
        }
    }
}

pub(crate) fn duration_nanos(d: Duration) -> i64 {
    i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)
}

/// Rate of timed events plus the distribution of their durations.
pub struct Timer {
    clock: Arc<dyn Clock>,
    meter: Meter,
    histogram: Histogram,
    elapsed: AtomicU64,
}

impl Timer {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            meter: Meter::new(Arc::clone(&clock)),
            histogram: Histogram::new(Arc::clone(&clock)),
            elapsed: AtomicU64::new(0),
            clock,
        }
    }

    pub fn update(&self, duration: Duration) {
        let nanos = duration_nanos(duration);
        self.histogram.update(nanos);
        self.meter.mark();
        self.elapsed.fetch_add(nanos as u64, Ordering::Relaxed);
    }

    /// Run `f` and record how long it took, even if it panics.
    pub fn time<T>(&self, f: impl FnOnce() -> T) -> T {
        let _context = self.start();
        f()
    }

    pub fn start(&self) -> TimerContext<'_> {
        TimerContext::new(self)
    }

    pub fn count(&self) -> u64 {
        self.meter.count()
    }

    /// Sum of every recorded duration.
    pub fn elapsed_time(&self) -> Duration {
        Duration::from_nanos(self.elapsed.load(Ordering::Relaxed))
    }

    pub fn mean_rate(&self) -> f64 {
        self.meter.mean_rate()
    }

    pub fn one_minute_rate(&self) -> f64 {
        self.meter.one_minute_rate()
    }

    pub fn five_minute_rate(&self) -> f64 {
        self.meter.five_minute_rate()
    }

    pub fn fifteen_minute_rate(&self) -> f64 {
        self.meter.fifteen_minute_rate()
    }

    /// Durations in nanoseconds.
    pub fn snapshot(&self) -> Snapshot {
        self.histogram.snapshot()
    }
}

impl RecordDuration for Timer {
    fn record(&self, elapsed: Duration) {
        self.update(elapsed);
    }

    fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("count", &self.count())
            .field("elapsed", &self.elapsed_time())
            .finish_non_exhaustive()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::clock::ManualClock};

    #[test]
    fn update_feeds_meter_histogram_and_elapsed() {
        let timer = Timer::new(Arc::new(ManualClock::default()));
        timer.update(Duration::from_millis(5));
        timer.update(Duration::from_millis(15));
        assert_eq!(timer.count(), 2);
        assert_eq!(timer.elapsed_time(), Duration::from_millis(20));
        let snapshot = timer.snapshot();
        assert_eq!(snapshot.min(), 5_000_000);
        assert_eq!(snapshot.max(), 15_000_000);
    }

    #[test]
    fn time_measures_the_closure() {
        let clock = Arc::new(ManualClock::default());
        let timer = Timer::new(clock.clone());
        let out = timer.time(|| {
            clock.advance(Duration::from_millis(40));
            7
        });
        assert_eq!(out, 7);
        assert_eq!(timer.count(), 1);
        assert_eq!(timer.elapsed_time(), Duration::from_millis(40));
    }

    #[test]
    fn context_records_once() {
        let clock = Arc::new(ManualClock::default());
        let timer = Timer::new(clock.clone());
        let context = timer.start();
        clock.advance(Duration::from_millis(3));
        assert_eq!(context.stop(), Duration::from_millis(3));
        assert_eq!(timer.count(), 1);

        {
            let _scoped = timer.start();
            clock.advance(Duration::from_millis(2));
        }
        assert_eq!(timer.count(), 2);
        assert_eq!(timer.elapsed_time(), Duration::from_millis(5));
    }

    #[test]
    fn records_when_the_timed_closure_panics() {
        let timer = Timer::new(Arc::new(ManualClock::default()));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            timer.time::<()>(|| panic!("boom"))
        }));
        assert!(result.is_err());
        assert_eq!(timer.count(), 1);
    }
}
