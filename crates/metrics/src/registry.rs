//! The concurrent store of metrics and their per-name metadata.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex},
};

use {
    dashmap::DashMap,
    serde_json::Value,
    tracing::{debug, warn},
};

use crate::{
    clock::{Clock, SystemClock},
    concurrent_gauge::ConcurrentGauge,
    counter::Counter,
    error::{Error, Result},
    gauge::Gauge,
    histogram::Histogram,
    id::{MetricId, Tag},
    metadata::{Metadata, MetricType},
    meter::Meter,
    metric::{Metric, MetricKind},
    simple_timer::SimpleTimer,
    timer::Timer,
};

/// Metadata for one name together with the tag sets of every id using it.
#[derive(Debug, Clone)]
pub struct MergedMetadata {
    pub metadata: Metadata,
    pub tags: Vec<BTreeMap<String, String>>,
}

/// A named set of metrics.
///
/// Reads go straight to the concurrent maps. Registration and removal take a
/// short write section so that an id and its metadata change together.
pub struct MetricRegistry {
    name: String,
    clock: Arc<dyn Clock>,
    metrics: DashMap<MetricId, Metric>,
    metadata: DashMap<String, Metadata>,
    write: Mutex<()>,
}

impl MetricRegistry {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_clock(name, SystemClock::shared())
    }

    #[must_use]
    pub fn with_clock(name: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            clock,
            metrics: DashMap::new(),
            metadata: DashMap::new(),
            write: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Store `metric` under `metadata.name` plus `tags`.
    ///
    /// When the id is already taken the existing instance is returned only if
    /// both registrations are reusable and agree on kind and unit. Every id
    /// sharing a name must agree with the name's metadata.
    pub fn register(&self, metadata: Metadata, metric: Metric, tags: &[Tag]) -> Result<Metric> {
        let id = MetricId::new(metadata.name(), tags.iter().cloned());
        if metadata.metric_type() != metric.metric_type() {
            return Err(Error::TypeConflict {
                id,
                existing: metadata.metric_type(),
                requested: metric.metric_type(),
            });
        }

        let _guard = self.write.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(existing) = self.metrics.get(&id) {
            let reusable = self.metadata.get(id.name()).is_some_and(|current| {
                metadata.is_reusable()
                    && current.is_reusable()
                    && current.is_compatible_with(&metadata)
            });
            return if reusable {
                Ok(existing.clone())
            } else {
                Err(Error::duplicate(id))
            };
        }

        if let Some(current) = self.metadata.get(id.name()) {
            if current.metric_type() != metadata.metric_type() {
                return Err(Error::TypeConflict {
                    id,
                    existing: current.metric_type(),
                    requested: metadata.metric_type(),
                });
            }
            if !current.is_compatible_with(&metadata) {
                return Err(Error::duplicate(id));
            }
        }

        debug!(registry = %self.name, metric = %id, kind = %metric.metric_type(), "registered metric");
        self.metadata
            .entry(id.name().to_string())
            .or_insert(metadata);
        self.metrics.insert(id, metric.clone());
        Ok(metric)
    }

    /// Return the metric with this id, creating it with `make` if absent.
    pub fn get_or_add<K: MetricKind>(
        &self,
        metadata: Metadata,
        tags: &[Tag],
        make: impl FnOnce() -> K,
    ) -> Result<Arc<K>> {
        let id = MetricId::new(metadata.name(), tags.iter().cloned());
        if let Some(existing) = self.metrics.get(&id) {
            return K::unwrap_from(&existing).ok_or_else(|| Error::TypeConflict {
                id: id.clone(),
                existing: existing.metric_type(),
                requested: K::TYPE,
            });
        }

        match self.register(metadata, K::wrap(Arc::new(make())), tags) {
            Ok(metric) => K::unwrap_from(&metric).ok_or_else(|| Error::TypeConflict {
                id,
                existing: metric.metric_type(),
                requested: K::TYPE,
            }),
            Err(Error::DuplicateMetric { id }) => {
                let existing = self.require(&id)?;
                K::unwrap_from(&existing).ok_or(Error::TypeConflict {
                    existing: existing.metric_type(),
                    requested: K::TYPE,
                    id,
                })
            },
            Err(e) => Err(e),
        }
    }

    pub fn counter(&self, name: &str, tags: &[Tag]) -> Result<Arc<Counter>> {
        self.counter_with(Metadata::of(name, MetricType::Counter), tags)
    }

    pub fn counter_with(&self, metadata: Metadata, tags: &[Tag]) -> Result<Arc<Counter>> {
        self.get_or_add(metadata, tags, Counter::new)
    }

    /// Register a gauge read from `supplier`. An existing gauge keeps its own
    /// supplier.
    pub fn gauge<F, T>(&self, metadata: Metadata, tags: &[Tag], supplier: F) -> Result<Arc<Gauge>>
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: Into<Value>,
    {
        self.get_or_add(metadata, tags, || Gauge::new(supplier))
    }

    pub fn histogram(&self, name: &str, tags: &[Tag]) -> Result<Arc<Histogram>> {
        self.histogram_with(Metadata::of(name, MetricType::Histogram), tags)
    }

    pub fn histogram_with(&self, metadata: Metadata, tags: &[Tag]) -> Result<Arc<Histogram>> {
        self.get_or_add(metadata, tags, || Histogram::new(self.clock()))
    }

    pub fn meter(&self, name: &str, tags: &[Tag]) -> Result<Arc<Meter>> {
        self.meter_with(Metadata::of(name, MetricType::Meter), tags)
    }

    pub fn meter_with(&self, metadata: Metadata, tags: &[Tag]) -> Result<Arc<Meter>> {
        self.get_or_add(metadata, tags, || Meter::new(self.clock()))
    }

    pub fn timer(&self, name: &str, tags: &[Tag]) -> Result<Arc<Timer>> {
        self.timer_with(Metadata::of(name, MetricType::Timer), tags)
    }

    pub fn timer_with(&self, metadata: Metadata, tags: &[Tag]) -> Result<Arc<Timer>> {
        self.get_or_add(metadata, tags, || Timer::new(self.clock()))
    }

    pub fn simple_timer(&self, name: &str, tags: &[Tag]) -> Result<Arc<SimpleTimer>> {
        self.simple_timer_with(Metadata::of(name, MetricType::SimpleTimer), tags)
    }

    pub fn simple_timer_with(&self, metadata: Metadata, tags: &[Tag]) -> Result<Arc<SimpleTimer>> {
        self.get_or_add(metadata, tags, || SimpleTimer::new(self.clock()))
    }

    pub fn concurrent_gauge(&self, name: &str, tags: &[Tag]) -> Result<Arc<ConcurrentGauge>> {
        self.concurrent_gauge_with(Metadata::of(name, MetricType::ConcurrentGauge), tags)
    }

    pub fn concurrent_gauge_with(
        &self,
        metadata: Metadata,
        tags: &[Tag],
    ) -> Result<Arc<ConcurrentGauge>> {
        self.get_or_add(metadata, tags, || ConcurrentGauge::new(self.clock()))
    }

    pub fn get(&self, id: &MetricId) -> Option<Metric> {
        self.metrics.get(id).map(|m| m.clone())
    }

    /// Like [`get`](Self::get), for callers that expect the metric to exist.
    pub fn require(&self, id: &MetricId) -> Result<Metric> {
        self.get(id).ok_or_else(|| {
            warn!(registry = %self.name, metric = %id, "metric is not registered");
            Error::unknown(id.clone())
        })
    }

    pub fn metadata(&self, name: &str) -> Option<Metadata> {
        self.metadata.get(name).map(|m| m.clone())
    }

    pub fn contains(&self, id: &MetricId) -> bool {
        self.metrics.contains_key(id)
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Remove every id with this name, then the name's metadata.
    pub fn remove(&self, name: &str) -> bool {
        let _guard = self.write.lock().unwrap_or_else(|e| e.into_inner());
        let before = self.metrics.len();
        self.metrics.retain(|id, _| id.name() != name);
        let removed = self.metrics.len() != before;
        self.metadata.remove(name);
        if removed {
            debug!(registry = %self.name, name, "removed metrics");
        }
        removed
    }

    /// Remove one id. The name's metadata goes once no id uses the name.
    pub fn remove_id(&self, id: &MetricId) -> bool {
        let _guard = self.write.lock().unwrap_or_else(|e| e.into_inner());
        let removed = self.metrics.remove(id).is_some();
        if removed {
            self.drop_orphaned_metadata(id.name());
            debug!(registry = %self.name, metric = %id, "removed metric");
        }
        removed
    }

    /// Remove every metric `filter` selects, returning how many went.
    pub fn remove_matching(&self, filter: impl Fn(&MetricId, &Metric) -> bool) -> usize {
        let _guard = self.write.lock().unwrap_or_else(|e| e.into_inner());
        let doomed: Vec<MetricId> = self
            .metrics
            .iter()
            .filter(|entry| filter(entry.key(), entry.value()))
            .map(|entry| entry.key().clone())
            .collect();
        for id in &doomed {
            self.metrics.remove(id);
        }
        let names: BTreeSet<&str> = doomed.iter().map(MetricId::name).collect();
        for name in names {
            self.drop_orphaned_metadata(name);
        }
        doomed.len()
    }

    fn drop_orphaned_metadata(&self, name: &str) {
        if !self.metrics.iter().any(|entry| entry.key().name() == name) {
            self.metadata.remove(name);
        }
    }

    pub fn names(&self) -> BTreeSet<String> {
        self.metrics
            .iter()
            .map(|entry| entry.key().name().to_string())
            .collect()
    }

    pub fn metric_ids(&self) -> BTreeSet<MetricId> {
        self.metrics.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Every metric, ordered by id.
    pub fn metrics(&self) -> BTreeMap<MetricId, Metric> {
        self.filtered(|_, _| true)
    }

    pub fn filtered(&self, filter: impl Fn(&MetricId, &Metric) -> bool) -> BTreeMap<MetricId, Metric> {
        self.metrics
            .iter()
            .filter(|entry| filter(entry.key(), entry.value()))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Metrics of one kind that pass `filter`, ordered by id.
    pub fn of_kind<K: MetricKind>(
        &self,
        filter: impl Fn(&MetricId, &Metric) -> bool,
    ) -> BTreeMap<MetricId, Arc<K>> {
        self.metrics
            .iter()
            .filter(|entry| filter(entry.key(), entry.value()))
            .filter_map(|entry| K::unwrap_from(entry.value()).map(|m| (entry.key().clone(), m)))
            .collect()
    }

    pub fn counters(&self, filter: impl Fn(&MetricId, &Metric) -> bool) -> BTreeMap<MetricId, Arc<Counter>> {
        self.of_kind(filter)
    }

    pub fn gauges(&self, filter: impl Fn(&MetricId, &Metric) -> bool) -> BTreeMap<MetricId, Arc<Gauge>> {
        self.of_kind(filter)
    }

    pub fn histograms(
        &self,
        filter: impl Fn(&MetricId, &Metric) -> bool,
    ) -> BTreeMap<MetricId, Arc<Histogram>> {
        self.of_kind(filter)
    }

    pub fn meters(&self, filter: impl Fn(&MetricId, &Metric) -> bool) -> BTreeMap<MetricId, Arc<Meter>> {
        self.of_kind(filter)
    }

    pub fn timers(&self, filter: impl Fn(&MetricId, &Metric) -> bool) -> BTreeMap<MetricId, Arc<Timer>> {
        self.of_kind(filter)
    }

    pub fn simple_timers(
        &self,
        filter: impl Fn(&MetricId, &Metric) -> bool,
    ) -> BTreeMap<MetricId, Arc<SimpleTimer>> {
        self.of_kind(filter)
    }

    pub fn concurrent_gauges(
        &self,
        filter: impl Fn(&MetricId, &Metric) -> bool,
    ) -> BTreeMap<MetricId, Arc<ConcurrentGauge>> {
        self.of_kind(filter)
    }

    /// Per name: the shared metadata and the tag set of each id.
    pub fn metadata_with_merged_tags(&self) -> BTreeMap<String, MergedMetadata> {
        let mut merged: BTreeMap<String, MergedMetadata> = BTreeMap::new();
        for id in self.metric_ids() {
            let Some(metadata) = self.metadata(id.name()) else {
                continue;
            };
            merged
                .entry(id.name().to_string())
                .or_insert_with(|| MergedMetadata {
                    metadata,
                    tags: Vec::new(),
                })
                .tags
                .push(id.tags().clone());
        }
        merged
    }
}

impl std::fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("name", &self.name)
            .field("metrics", &self.metrics.len())
            .finish_non_exhaustive()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::clock::ManualClock, rstest::rstest};

    fn registry() -> MetricRegistry {
        MetricRegistry::with_clock("application", Arc::new(ManualClock::default()))
    }

    #[test]
    fn accessor_returns_the_registered_instance() {
        let registry = registry();
        let registered = registry
            .register(
                Metadata::of("hits", MetricType::Counter),
                Metric::from(Arc::new(Counter::new())),
                &[],
            )
            .unwrap();
        let fetched = registry.counter("hits", &[]).unwrap();
        assert!(registered.same_instance(&Metric::Counter(fetched)));
    }

    #[test]
    fn reusable_registration_returns_the_existing_instance() {
        let registry = registry();
        let md = Metadata::builder("jobs", MetricType::Counter).reusable(true).build();
        let first = registry
            .register(md.clone(), Metric::from(Arc::new(Counter::new())), &[])
            .unwrap();
        let second = registry
            .register(md, Metric::from(Arc::new(Counter::new())), &[])
            .unwrap();
        assert!(first.same_instance(&second));
        assert_eq!(registry.metric_ids().len(), 1);
    }

    #[rstest]
    #[case::not_reusable(false, "none")]
    #[case::unit_differs(true, "seconds")]
    fn incompatible_reregistration_is_a_duplicate(#[case] reusable: bool, #[case] unit: &str) {
        let registry = registry();
        let first = Metadata::builder("jobs", MetricType::Counter).reusable(reusable).build();
        registry
            .register(first, Metric::from(Arc::new(Counter::new())), &[])
            .unwrap();
        let second = Metadata::builder("jobs", MetricType::Counter)
            .reusable(true)
            .unit(unit)
            .build();
        let err = registry
            .register(second, Metric::from(Arc::new(Counter::new())), &[])
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateMetric { .. }));
    }

    #[test]
    fn same_name_different_kind_is_a_type_conflict() {
        let registry = registry();
        registry.counter("X", &[]).unwrap();
        let err = registry.histogram("X", &[]).unwrap_err();
        assert!(matches!(
            err,
            Error::TypeConflict {
                existing: MetricType::Counter,
                requested: MetricType::Histogram,
                ..
            }
        ));
    }

    #[test]
    fn tagged_variants_must_share_kind() {
        let registry = registry();
        registry.counter("X", &[Tag::new("a", "1")]).unwrap();
        let err = registry.meter("X", &[Tag::new("a", "2")]).unwrap_err();
        assert!(matches!(err, Error::TypeConflict { .. }));
    }

    #[test]
    fn first_metadata_wins() {
        let registry = registry();
        let md = Metadata::builder("req", MetricType::Counter)
            .description("first")
            .build();
        registry.counter_with(md, &[Tag::new("a", "1")]).unwrap();
        let md = Metadata::builder("req", MetricType::Counter)
            .description("second")
            .build();
        registry.counter_with(md, &[Tag::new("a", "2")]).unwrap();
        assert_eq!(registry.metadata("req").unwrap().description(), Some("first"));
    }

    #[test]
    fn metadata_outlives_all_but_the_last_id() {
        let registry = registry();
        let one = MetricId::new("sameName", [Tag::new("test", "1")]);
        let two = MetricId::new("sameName", [Tag::new("test", "2")]);
        registry.counter("sameName", &one.tags_as_list()).unwrap();
        registry.counter("sameName", &two.tags_as_list()).unwrap();

        assert!(registry.remove_id(&one));
        assert!(registry.metadata("sameName").is_some());
        assert!(registry.remove_id(&two));
        assert!(registry.metadata("sameName").is_none());
    }

    #[test]
    fn remove_by_name_drops_every_variant() {
        let registry = registry();
        registry.counter("a", &[Tag::new("x", "1")]).unwrap();
        registry.counter("a", &[Tag::new("x", "2")]).unwrap();
        registry.counter("b", &[]).unwrap();
        assert!(registry.remove("a"));
        assert_eq!(registry.names(), BTreeSet::from(["b".to_string()]));
        assert!(registry.metadata("a").is_none());
        assert!(!registry.remove("a"));
    }

    #[test]
    fn remove_matching_cleans_metadata_lazily() {
        let registry = registry();
        registry.counter("a", &[Tag::new("x", "1")]).unwrap();
        registry.counter("a", &[Tag::new("x", "2")]).unwrap();
        registry.meter("m", &[]).unwrap();

        let removed = registry.remove_matching(|id, _| id.tags().get("x").is_some_and(|v| v == "1"));
        assert_eq!(removed, 1);
        assert!(registry.metadata("a").is_some());

        let removed = registry.remove_matching(|_, metric| metric.metric_type() == MetricType::Counter);
        assert_eq!(removed, 1);
        assert!(registry.metadata("a").is_none());
        assert!(registry.metadata("m").is_some());
    }

    #[test]
    fn typed_views_filter_by_kind() {
        let registry = registry();
        registry.counter("c1", &[]).unwrap();
        registry.counter("c2", &[]).unwrap();
        registry.timer("t", &[]).unwrap();
        registry
            .gauge(Metadata::of("g", MetricType::Gauge), &[], || 1)
            .unwrap();

        assert_eq!(registry.counters(|_, _| true).len(), 2);
        assert_eq!(registry.counters(|id, _| id.name() == "c2").len(), 1);
        assert_eq!(registry.timers(|_, _| true).len(), 1);
        assert_eq!(registry.gauges(|_, _| true).len(), 1);
        assert!(registry.meters(|_, _| true).is_empty());
    }

    #[test]
    fn merged_metadata_lists_every_tag_set() {
        let registry = registry();
        registry.counter("c", &[Tag::new("k", "1")]).unwrap();
        registry.counter("c", &[Tag::new("k", "2")]).unwrap();
        let merged = registry.metadata_with_merged_tags();
        assert_eq!(merged["c"].tags.len(), 2);
        assert_eq!(merged["c"].metadata.metric_type(), MetricType::Counter);
    }

    #[test]
    fn require_reports_unknown_ids() {
        let err = registry().require(&MetricId::untagged("missing")).unwrap_err();
        assert!(matches!(err, Error::UnknownMetric { .. }));
    }
}
