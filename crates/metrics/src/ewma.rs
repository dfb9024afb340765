//! Exponentially weighted moving average over fixed ticks.

use std::{
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
    time::Duration,
};

pub(crate) const TICK_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub(crate) struct Ewma {
    alpha: f64,
    interval_secs: f64,
    uncounted: AtomicU64,
    /// Events per second, stored as `f64` bits.
    rate: AtomicU64,
    initialized: AtomicBool,
}

impl Ewma {
    pub(crate) fn one_minute() -> Self {
        Self::over(Duration::from_secs(60))
    }

    pub(crate) fn five_minutes() -> Self {
        Self::over(Duration::from_secs(5 * 60))
    }

    pub(crate) fn fifteen_minutes() -> Self {
        Self::over(Duration::from_secs(15 * 60))
    }

    fn over(window: Duration) -> Self {
        let interval_secs = TICK_INTERVAL.as_secs_f64();
        Self {
            alpha: 1.0 - (-interval_secs / window.as_secs_f64()).exp(),
            interval_secs,
            uncounted: AtomicU64::new(0),
            rate: AtomicU64::new(0f64.to_bits()),
            initialized: AtomicBool::new(false),
        }
    }

    pub(crate) fn update(&self, n: u64) {
        self.uncounted.fetch_add(n, Ordering::Relaxed);
    }

    /// Fold the events seen since the last tick into the average.
    pub(crate) fn tick(&self) {
        let count = self.uncounted.swap(0, Ordering::Relaxed);
        let instant = count as f64 / self.interval_secs;
        if self.initialized.swap(true, Ordering::AcqRel) {
            let old = f64::from_bits(self.rate.load(Ordering::Acquire));
            let next = old + self.alpha * (instant - old);
            self.rate.store(next.to_bits(), Ordering::Release);
        } else {
            self.rate.store(instant.to_bits(), Ordering::Release);
        }
    }

    pub(crate) fn rate(&self) -> f64 {
        f64::from_bits(self.rate.load(Ordering::Acquire))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_takes_instant_rate() {
        let ewma = Ewma::one_minute();
        ewma.update(3);
        ewma.tick();
        assert!((ewma.rate() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn one_minute_rate_decays_by_alpha() {
        let ewma = Ewma::one_minute();
        ewma.update(3);
        ewma.tick();
        // A minute of idle ticks decays the rate to 0.6 / e.
        for _ in 0..12 {
            ewma.tick();
        }
        assert!((ewma.rate() - 0.6 * (-1.0f64).exp()).abs() < 1e-9);
    }
}
