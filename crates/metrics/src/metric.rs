use std::sync::Arc;

use crate::{
    concurrent_gauge::ConcurrentGauge, counter::Counter, gauge::Gauge, histogram::Histogram,
    metadata::MetricType, meter::Meter, simple_timer::SimpleTimer, timer::Timer,
};

/// A registered metric of any kind.
///
/// Cloning is cheap and yields another handle to the same instance.
#[derive(Debug, Clone)]
pub enum Metric {
    Counter(Arc<Counter>),
    Gauge(Arc<Gauge>),
    Histogram(Arc<Histogram>),
    Meter(Arc<Meter>),
    Timer(Arc<Timer>),
    SimpleTimer(Arc<SimpleTimer>),
    ConcurrentGauge(Arc<ConcurrentGauge>),
}

impl Metric {
    pub fn metric_type(&self) -> MetricType {
        match self {
            Self::Counter(_) => MetricType::Counter,
            Self::Gauge(_) => MetricType::Gauge,
            Self::Histogram(_) => MetricType::Histogram,
            Self::Meter(_) => MetricType::Meter,
            Self::Timer(_) => MetricType::Timer,
            Self::SimpleTimer(_) => MetricType::SimpleTimer,
            Self::ConcurrentGauge(_) => MetricType::ConcurrentGauge,
        }
    }

    /// Whether both handles point at the same instance.
    pub fn same_instance(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Counter(a), Self::Counter(b)) => Arc::ptr_eq(a, b),
            (Self::Gauge(a), Self::Gauge(b)) => Arc::ptr_eq(a, b),
            (Self::Histogram(a), Self::Histogram(b)) => Arc::ptr_eq(a, b),
            (Self::Meter(a), Self::Meter(b)) => Arc::ptr_eq(a, b),
            (Self::Timer(a), Self::Timer(b)) => Arc::ptr_eq(a, b),
            (Self::SimpleTimer(a), Self::SimpleTimer(b)) => Arc::ptr_eq(a, b),
            (Self::ConcurrentGauge(a), Self::ConcurrentGauge(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// A concrete metric kind that can be stored in and pulled out of a [`Metric`].
pub trait MetricKind: Sized {
    const TYPE: MetricType;

    fn wrap(this: Arc<Self>) -> Metric;

    fn unwrap_from(metric: &Metric) -> Option<Arc<Self>>;
}

macro_rules! metric_kind {
    ($kind:ident) => {
        impl MetricKind for $kind {
            const TYPE: MetricType = MetricType::$kind;

            fn wrap(this: Arc<Self>) -> Metric {
                Metric::$kind(this)
            }

            fn unwrap_from(metric: &Metric) -> Option<Arc<Self>> {
                match metric {
                    Metric::$kind(inner) => Some(Arc::clone(inner)),
                    _ => None,
                }
            }
        }

        impl From<Arc<$kind>> for Metric {
            fn from(inner: Arc<$kind>) -> Self {
                Self::$kind(inner)
            }
        }
    };
}

metric_kind!(Counter);
metric_kind!(Gauge);
metric_kind!(Histogram);
metric_kind!(Meter);
metric_kind!(Timer);
metric_kind!(SimpleTimer);
metric_kind!(ConcurrentGauge);
