//! The grouped JSON document: one object per registry, keyed by metric name.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

use crate::{
    error::{Error, Result},
    export::scope::ExportScope,
    global_tags::GlobalTags,
    id::{MetricId, tag_suffix},
    metric::Metric,
    registry::MetricRegistry,
    snapshot::Snapshot,
};

/// Renders metric values as JSON.
#[derive(Debug, Clone, Default)]
pub struct JsonExporter {
    global_tags: GlobalTags,
}

impl JsonExporter {
    #[must_use]
    pub fn new(global_tags: GlobalTags) -> Self {
        Self { global_tags }
    }

    /// Every metric of `registry`, grouped by name.
    pub fn registry(&self, registry: &MetricRegistry) -> Value {
        Value::Object(self.group(registry.metrics()))
    }

    /// The group for one metric name.
    pub fn metric(&self, registry: &MetricRegistry, name: &str) -> Value {
        Value::Object(self.group(registry.filtered(|id, _| id.name() == name)))
    }

    /// `None` when the scope has nothing to render.
    pub fn scope(&self, scope: &ExportScope) -> Option<Value> {
        match scope {
            ExportScope::All(registries) => Some(Value::Object(
                registries
                    .iter()
                    .map(|r| (r.name().to_string(), self.registry(r)))
                    .collect(),
            )),
            ExportScope::Registry(registry) => Some(self.registry(registry)),
            ExportScope::Metric { registry, name } => Some(self.metric(registry, name)),
            ExportScope::NotFound | ExportScope::NoContent => None,
        }
    }

    pub fn render(&self, scope: &ExportScope) -> Result<Option<String>> {
        self.scope(scope)
            .map(|doc| {
                serde_json::to_string_pretty(&doc)
                    .map_err(|e| Error::export("serializing metrics as JSON", e))
            })
            .transpose()
    }

    fn group(&self, metrics: BTreeMap<MetricId, Metric>) -> Map<String, Value> {
        let mut by_name: BTreeMap<String, Vec<(MetricId, Metric)>> = BTreeMap::new();
        for (id, metric) in metrics {
            by_name.entry(id.name().to_string()).or_default().push((id, metric));
        }

        let mut out = Map::new();
        for (name, members) in by_name {
            if let [(id, metric)] = members.as_slice()
                && !metric.metric_type().is_composite()
            {
                let suffix = tag_suffix(&id.tags_with(self.global_tags.tags()));
                out.insert(format!("{name}{suffix}"), simple_value(metric));
                continue;
            }
            let mut fields = Map::new();
            for (id, metric) in &members {
                let suffix = tag_suffix(&id.tags_with(self.global_tags.tags()));
                write_fields(metric, &suffix, &mut fields);
            }
            out.insert(name, Value::Object(fields));
        }
        out
    }
}

fn simple_value(metric: &Metric) -> Value {
    match metric {
        Metric::Counter(counter) => json!(counter.count()),
        Metric::Gauge(gauge) => gauge.value(),
        _ => Value::Null,
    }
}

/// Append `metric`'s fields, each name followed by `suffix`.
fn write_fields(metric: &Metric, suffix: &str, out: &mut Map<String, Value>) {
    let mut put = |field: &str, value: Value| {
        out.insert(format!("{field}{suffix}"), value);
    };
    match metric {
        Metric::Counter(counter) => put("count", json!(counter.count())),
        Metric::Gauge(gauge) => put("value", gauge.value()),
        Metric::Meter(meter) => {
            put("count", json!(meter.count()));
            put("meanRate", json!(meter.mean_rate()));
            put("oneMinRate", json!(meter.one_minute_rate()));
            put("fiveMinRate", json!(meter.five_minute_rate()));
            put("fifteenMinRate", json!(meter.fifteen_minute_rate()));
        },
        Metric::Histogram(histogram) => {
            put("count", json!(histogram.count()));
            put("sum", json!(histogram.sum()));
            snapshot_fields(&histogram.snapshot(), &mut put);
        },
        Metric::Timer(timer) => {
            put("count", json!(timer.count()));
            put("meanRate", json!(timer.mean_rate()));
            put("oneMinRate", json!(timer.one_minute_rate()));
            put("fiveMinRate", json!(timer.five_minute_rate()));
            put("fifteenMinRate", json!(timer.fifteen_minute_rate()));
            snapshot_fields(&timer.snapshot(), &mut put);
            put("elapsedTime", json!(nanos(timer.elapsed_time())));
        },
        Metric::SimpleTimer(timer) => {
            put("count", json!(timer.count()));
            put("elapsedTime", json!(nanos(timer.elapsed_time())));
            put("maxTimeDuration", json!(timer.max_time_duration().map(nanos)));
            put("minTimeDuration", json!(timer.min_time_duration().map(nanos)));
        },
        Metric::ConcurrentGauge(gauge) => {
            put("current", json!(gauge.count()));
            put("min", json!(gauge.min()));
            put("max", json!(gauge.max()));
        },
    }
}

fn snapshot_fields(snapshot: &Snapshot, put: &mut impl FnMut(&str, Value)) {
    put("min", json!(snapshot.min()));
    put("max", json!(snapshot.max()));
    put("mean", json!(snapshot.mean()));
    put("stddev", json!(snapshot.stddev()));
    put("p50", json!(snapshot.median()));
    put("p75", json!(snapshot.p75()));
    put("p95", json!(snapshot.p95()));
    put("p98", json!(snapshot.p98()));
    put("p99", json!(snapshot.p99()));
    put("p999", json!(snapshot.p999()));
}

fn nanos(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
