//! Tagged, typed metrics for tally.
//!
//! A [`MetricRegistry`] maps a [`MetricId`] (name plus tags) to one of seven
//! metric kinds and keeps one [`Metadata`] record per name. [`Registries`]
//! owns the process's registries and tracks which of them push reporters
//! cover. The `export` module renders registries as grouped JSON, JSON
//! metadata or Prometheus text.
//!
//! ```rust,ignore
//! use tally_metrics::{Registries, Tag};
//!
//! let registries = Registries::new();
//! let hits = registries.application().counter("hits", &[Tag::new("route", "/")])?;
//! hits.inc();
//! ```

pub mod clock;
pub mod concurrent_gauge;
pub mod counter;
pub mod error;
mod ewma;
pub mod export;
pub mod gauge;
pub mod global_tags;
pub mod histogram;
pub mod id;
pub mod metadata;
pub mod meter;
pub mod metric;
pub mod payload;
pub mod registries;
pub mod registry;
pub mod reservoir;
pub mod simple_timer;
pub mod snapshot;
pub mod timer;
mod window;

pub use {
    clock::{Clock, ManualClock, SystemClock},
    concurrent_gauge::ConcurrentGauge,
    counter::Counter,
    error::{Error, Result},
    export::{ExportScope, JsonExporter, MetadataExporter, PrometheusExporter},
    gauge::Gauge,
    global_tags::GlobalTags,
    histogram::Histogram,
    id::{MetricId, Tag, parse_tags},
    metadata::{Metadata, MetricType, units},
    meter::Meter,
    metric::{Metric, MetricKind},
    payload::{MetricsPayload, ServiceIdentity, ServiceInfo},
    registries::{EnabledRegistries, Registries},
    registry::{MergedMetadata, MetricRegistry},
    reservoir::DecayingReservoir,
    simple_timer::SimpleTimer,
    snapshot::Snapshot,
    timer::{Timer, TimerContext},
};
