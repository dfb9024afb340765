use std::sync::{
    Arc,
    atomic::{AtomicI64, AtomicU64, Ordering},
};

use crate::{clock::Clock, reservoir::DecayingReservoir, snapshot::Snapshot};

/// Distribution of recorded values over a decaying sample.
#[derive(Debug)]
pub struct Histogram {
    count: AtomicU64,
    sum: AtomicI64,
    reservoir: DecayingReservoir,
}

impl Histogram {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_reservoir(DecayingReservoir::new(clock))
    }

    #[must_use]
    pub fn with_reservoir(reservoir: DecayingReservoir) -> Self {
        Self {
            count: AtomicU64::new(0),
            sum: AtomicI64::new(0),
            reservoir,
        }
    }

    pub fn update(&self, value: i64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum.fetch_add(value, Ordering::Relaxed);
        self.reservoir.update(value);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Sum of every recorded value, including ones no longer sampled.
    pub fn sum(&self) -> i64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.reservoir.snapshot()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::clock::ManualClock};

    #[test]
    fn one_to_hundred_quantiles() {
        let histogram = Histogram::new(Arc::new(ManualClock::default()));
        for v in 1..=100 {
            histogram.update(v);
        }
        let snapshot = histogram.snapshot();
        assert_eq!(histogram.count(), 100);
        assert_eq!(histogram.sum(), 5050);
        assert_eq!(snapshot.max(), 100);
        assert_eq!(snapshot.min(), 1);
        assert!((snapshot.median() - 50.0).abs() <= 1.0);
        assert!((snapshot.p99() - 99.0).abs() <= 1.0);
    }

    #[test]
    fn sum_counts_values_beyond_the_sample() {
        let histogram = Histogram::with_reservoir(DecayingReservoir::with_params(
            4,
            crate::reservoir::DEFAULT_ALPHA,
            Arc::new(ManualClock::default()),
        ));
        for _ in 0..10 {
            histogram.update(2);
        }
        assert_eq!(histogram.count(), 10);
        assert_eq!(histogram.sum(), 20);
        assert_eq!(histogram.snapshot().size(), 4);
    }
}
