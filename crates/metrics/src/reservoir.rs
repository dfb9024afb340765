//! Forward-decaying priority reservoir.
//!
//! Each sample gets weight `exp(alpha * (t - t0))` and a random priority
//! `weight / u`; the reservoir keeps the `size` highest priorities, so recent
//! values dominate. The landmark `t0` moves forward every hour, scaling all
//! priorities by the same factor so their order is preserved.

use std::{
    cmp::Ordering,
    collections::BTreeMap,
    fmt,
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::{clock::Clock, snapshot::Snapshot};

pub const DEFAULT_SIZE: usize = 1024;
pub const DEFAULT_ALPHA: f64 = 0.015;
const RESCALE_THRESHOLD: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq)]
struct Priority(f64);

impl Eq for Priority {}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct WeightedSample {
    value: i64,
    weight: f64,
}

#[derive(Debug)]
struct State {
    samples: BTreeMap<Priority, WeightedSample>,
    landmark: u64,
    next_rescale: u64,
}

pub struct DecayingReservoir {
    size: usize,
    alpha: f64,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
}

impl fmt::Debug for DecayingReservoir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecayingReservoir")
            .field("size", &self.size)
            .field("alpha", &self.alpha)
            .finish_non_exhaustive()
    }
}

impl DecayingReservoir {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_params(DEFAULT_SIZE, DEFAULT_ALPHA, clock)
    }

    #[must_use]
    pub fn with_params(size: usize, alpha: f64, clock: Arc<dyn Clock>) -> Self {
        let now = clock.tick();
        Self {
            size: size.max(1),
            alpha,
            clock,
            state: Mutex::new(State {
                samples: BTreeMap::new(),
                landmark: now,
                next_rescale: now + RESCALE_THRESHOLD.as_nanos() as u64,
            }),
        }
    }

    pub fn update(&self, value: i64) {
        let now = self.clock.tick();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if now >= state.next_rescale {
            self.rescale(&mut state, now);
        }

        let elapsed = now.saturating_sub(state.landmark) as f64 / 1e9;
        let weight = (self.alpha * elapsed).exp();
        // `1 - u` is in (0, 1], so the priority is always finite.
        let u: f64 = rand::random();
        let priority = Priority(weight / (1.0 - u));
        let sample = WeightedSample { value, weight };

        if state.samples.len() < self.size {
            state.samples.entry(priority).or_insert(sample);
            return;
        }
        let lowest = state.samples.keys().next().copied();
        if let Some(lowest) = lowest
            && lowest < priority
            && !state.samples.contains_key(&priority)
        {
            state.samples.insert(priority, sample);
            state.samples.remove(&lowest);
        }
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .samples
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Snapshot::new(state.samples.values().map(|s| s.value).collect())
    }

    fn rescale(&self, state: &mut State, now: u64) {
        let old_landmark = state.landmark;
        state.landmark = now;
        state.next_rescale = now + RESCALE_THRESHOLD.as_nanos() as u64;

        let shift = now.saturating_sub(old_landmark) as f64 / 1e9;
        let factor = (-self.alpha * shift).exp();
        let old = std::mem::take(&mut state.samples);
        for (priority, sample) in old {
            let weight = sample.weight * factor;
            if weight == 0.0 {
                continue;
            }
            state.samples.insert(Priority(priority.0 * factor), WeightedSample {
                value: sample.value,
                weight,
            });
        }
    }
}
