use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use crate::{
    clock::Clock,
    timer::{RecordDuration, TimerContext, duration_nanos},
    window::MinuteWindow,
};

const EMPTY: (i64, i64) = (i64::MAX, i64::MIN);

/// Count and total of timed events plus the shortest and longest duration
/// seen during the previous full minute.
pub struct SimpleTimer {
    clock: Arc<dyn Clock>,
    count: AtomicU64,
    elapsed: AtomicU64,
    window: MinuteWindow,
}

impl SimpleTimer {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            window: MinuteWindow::new(Arc::clone(&clock), EMPTY, EMPTY),
            count: AtomicU64::new(0),
            elapsed: AtomicU64::new(0),
            clock,
        }
    }

    pub fn update(&self, duration: Duration) {
        self.window.roll_if_needed(|| EMPTY);
        let nanos = duration_nanos(duration);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.elapsed.fetch_add(nanos as u64, Ordering::Relaxed);
        self.window.accumulate_min(nanos);
        self.window.accumulate_max(nanos);
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
        self.count.load(Ordering::Relaxed)
    }

    pub fn elapsed_time(&self) -> Duration {
        Duration::from_nanos(self.elapsed.load(Ordering::Relaxed))
    }

    /// Longest duration recorded in the previous minute, if any.
    pub fn max_time_duration(&self) -> Option<Duration> {
        self.window.roll_if_needed(|| EMPTY);
        let (_, max) = self.window.previous();
        (max != EMPTY.1).then(|| Duration::from_nanos(max as u64))
    }

    /// Shortest duration recorded in the previous minute, if any.
    pub fn min_time_duration(&self) -> Option<Duration> {
        self.window.roll_if_needed(|| EMPTY);
        let (min, _) = self.window.previous();
        (min != EMPTY.0).then(|| Duration::from_nanos(min as u64))
    }
}

impl RecordDuration for SimpleTimer {
    fn record(&self, elapsed: Duration) {
        self.update(elapsed);
    }

    fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}

impl fmt::Debug for SimpleTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleTimer")
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
    fn min_and_max_are_undefined_for_the_first_minute() {
        let clock = Arc::new(ManualClock::starting_at(0));
        let timer = SimpleTimer::new(clock.clone());
        timer.update(Duration::from_millis(10));
        assert_eq!(timer.count(), 1);
        assert_eq!(timer.max_time_duration(), None);
        assert_eq!(timer.min_time_duration(), None);
    }

    #[test]
    fn previous_minute_extremes_are_published() {
        let clock = Arc::new(ManualClock::starting_at(0));
        let timer = SimpleTimer::new(clock.clone());
        timer.update(Duration::from_millis(10));
        timer.update(Duration::from_millis(30));
        timer.update(Duration::from_millis(20));
        clock.advance(Duration::from_secs(61));

        assert_eq!(timer.max_time_duration(), Some(Duration::from_millis(30)));
        assert_eq!(timer.min_time_duration(), Some(Duration::from_millis(10)));
        assert_eq!(timer.count(), 3);
        assert_eq!(timer.elapsed_time(), Duration::from_millis(60));
    }

    #[test]
    fn first_update_after_rollover_lands_in_the_new_minute() {
        let clock = Arc::new(ManualClock::starting_at(0));
        let timer = SimpleTimer::new(clock.clone());
        timer.update(Duration::from_millis(5));
        clock.advance(Duration::from_secs(60));
        timer.update(Duration::from_millis(500));

        assert_eq!(timer.max_time_duration(), Some(Duration::from_millis(5)));
        clock.advance(Duration::from_secs(60));
        assert_eq!(timer.max_time_duration(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn context_records_elapsed_ticks() {
        let clock = Arc::new(ManualClock::starting_at(0));
        let timer = SimpleTimer::new(clock.clone());
        let context = timer.start();
        clock.advance(Duration::from_millis(250));
        context.stop();
        assert_eq!(timer.elapsed_time(), Duration::from_millis(250));
    }
}
