use std::time::Duration;

/// Retry delay that doubles on each consecutive failure up to `max` and
/// drops back to `start` after a success.
#[derive(Debug, Clone)]
pub struct Backoff {
    start: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    /// `start` is clamped to `max`.
    #[must_use]
    pub fn new(start: Duration, max: Duration) -> Self {
        let start = start.min(max);
        Self {
            start,
            max,
            current: start,
        }
    }

    #[must_use]
    pub fn from_millis(start_ms: u64, max_ms: u64) -> Self {
        Self::new(Duration::from_millis(start_ms), Duration::from_millis(max_ms))
    }

    /// Delay the next failure would wait.
    #[must_use]
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Record a failure: returns the delay to wait now and doubles the next one.
    pub fn fail(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.start;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_millis(500, 900_000)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_until_capped() {
        let mut backoff = Backoff::from_millis(100, 500);
        let delays: Vec<u64> = (0..5).map(|_| backoff.fail().as_millis() as u64).collect();
        assert_eq!(delays, vec![100, 200, 400, 500, 500]);
    }

    #[test]
    fn success_resets_to_start() {
        let mut backoff = Backoff::from_millis(100, 1_000);
        backoff.fail();
        backoff.fail();
        assert_eq!(backoff.current(), Duration::from_millis(400));
        backoff.reset();
        assert_eq!(backoff.current(), Duration::from_millis(100));
    }

    #[test]
    fn start_above_max_is_clamped() {
        let mut backoff = Backoff::from_millis(5_000, 1_000);
        assert_eq!(backoff.fail(), Duration::from_secs(1));
    }
}
