//! Prometheus text exposition.

use std::{
    collections::{BTreeMap, HashMap},
    fmt::Write,
    time::Duration,
};

use tracing::warn;

use crate::{
    export::{
        scope::ExportScope,
        units::{Scale, UnitMapping},
    },
    global_tags::GlobalTags,
    id::MetricId,
    metadata::{Metadata, units},
    metric::Metric,
    registry::MetricRegistry,
    snapshot::Snapshot,
};

const QUANTILES: [(&str, fn(&Snapshot) -> f64); 6] = [
    ("0.5", Snapshot::median),
    ("0.75", Snapshot::p75),
    ("0.95", Snapshot::p95),
    ("0.98", Snapshot::p98),
    ("0.99", Snapshot::p99),
    ("0.999", Snapshot::p999),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Counter,
    Gauge,
    Summary,
}

impl Kind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::Summary => "summary",
        }
    }
}

struct Sample {
    name: String,
    labels: Vec<(String, String)>,
    value: f64,
}

/// Lines sharing one `# TYPE` header.
struct Family {
    name: String,
    kind: Kind,
    help: Option<String>,
    samples: Vec<Sample>,
}

/// Families in first-seen order, so every header is written once even when
/// tagged variants of a name are visited one after another.
#[derive(Default)]
struct Families {
    order: Vec<Family>,
    index: HashMap<String, usize>,
}

impl Families {
    fn family(&mut self, name: &str, kind: Kind, help: Option<&str>) -> &mut Family {
        let name = sanitize(name);
        let slot = match self.index.get(&name) {
            Some(slot) => *slot,
            None => {
                self.order.push(Family {
                    name: name.clone(),
                    kind,
                    help: help.map(str::to_string),
                    samples: Vec::new(),
                });
                self.index.insert(name, self.order.len() - 1);
                self.order.len() - 1
            },
        };
        &mut self.order[slot]
    }

    /// A family holding a single sample named after it.
    fn single(&mut self, name: &str, kind: Kind, help: Option<&str>, labels: &Labels, value: f64) {
        self.family(name, kind, help).push(name, labels.base.clone(), value);
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for family in &self.order {
            if let Some(help) = &family.help {
                let _ = writeln!(out, "# HELP {} {}", family.name, escape_help(help));
            }
            let _ = writeln!(out, "# TYPE {} {}", family.name, family.kind.as_str());
            for sample in &family.samples {
                out.push_str(&sample.name);
                if !sample.labels.is_empty() {
                    let labels: Vec<String> = sample
                        .labels
                        .iter()
                        .map(|(k, v)| {
                            format!("{}=\"{}\"", label_name(k), escape_label_value(v))
                        })
                        .collect();
                    let _ = write!(out, "{{{}}}", labels.join(","));
                }
                let _ = writeln!(out, " {}", format_value(sample.value));
            }
        }
        out
    }
}

impl Family {
    fn push(&mut self, name: &str, labels: Vec<(String, String)>, value: f64) {
        self.samples.push(Sample {
            name: sanitize(name),
            labels,
            value,
        });
    }
}

struct Labels {
    base: Vec<(String, String)>,
}

impl Labels {
    fn with_quantile(&self, quantile: &str) -> Vec<(String, String)> {
        let mut labels = self.base.clone();
        labels.push(("quantile".to_string(), quantile.to_string()));
        labels
    }
}

/// Renders registries in the Prometheus text format.
#[derive(Debug, Clone, Default)]
pub struct PrometheusExporter {
    global_tags: GlobalTags,
}

impl PrometheusExporter {
    #[must_use]
    pub fn new(global_tags: GlobalTags) -> Self {
        Self { global_tags }
    }

    /// `None` when the scope has nothing to render.
    pub fn render(&self, scope: &ExportScope) -> Option<String> {
        let mut families = Families::default();
        match scope {
            ExportScope::All(registries) => {
                for registry in registries {
                    self.collect(&mut families, registry, registry.metrics());
                }
            },
            ExportScope::Registry(registry) => {
                self.collect(&mut families, registry, registry.metrics());
            },
            ExportScope::Metric { registry, name } => {
                let metrics = registry.filtered(|id, _| id.name() == name);
                self.collect(&mut families, registry, metrics);
            },
            ExportScope::NotFound | ExportScope::NoContent => return None,
        }
        Some(families.render())
    }

    pub fn registry(&self, registry: &MetricRegistry) -> String {
        let mut families = Families::default();
        self.collect(&mut families, registry, registry.metrics());
        families.render()
    }

    fn collect(
        &self,
        families: &mut Families,
        registry: &MetricRegistry,
        metrics: BTreeMap<MetricId, Metric>,
    ) {
        for (id, metric) in metrics {
            let Some(metadata) = registry.metadata(id.name()) else {
                continue;
            };
            let base = sanitize(&format!("{}_{}", registry.name(), id.name()));
            let labels = Labels {
                base: id.tags_with(self.global_tags.tags()).into_iter().collect(),
            };
            write_metric(families, &base, &metadata, &labels, &metric, &id);
        }
    }
}

fn write_metric(
    families: &mut Families,
    base: &str,
    metadata: &Metadata,
    labels: &Labels,
    metric: &Metric,
    id: &MetricId,
) {
    let help = metadata.description();
    let unit = UnitMapping::resolve(metadata.unit());
    match metric {
        Metric::Counter(counter) => {
            let name = if base.ends_with("_total") {
                base.to_string()
            } else {
                format!("{base}_total")
            };
            families.single(&name, Kind::Counter, help, labels, counter.count() as f64);
        },
        Metric::Gauge(gauge) => {
            let Some(value) = gauge.numeric_value() else {
                warn!(metric = %id, value = %gauge.value(), "skipping non-numeric gauge");
                return;
            };
            let name = format!("{base}{}", unit.suffix());
            families.single(&name, Kind::Gauge, help, labels, unit.scale.apply(value));
        },
        Metric::Histogram(histogram) => {
            let sum = unit.scale.apply(histogram.sum() as f64);
            sampling(
                families,
                base,
                help,
                labels,
                &unit,
                &histogram.snapshot(),
                histogram.count(),
                sum,
            );
        },
        Metric::Meter(meter) => {
            counting(families, base, help, labels, meter.count());
            metered(families, base, labels, [
                meter.mean_rate(),
                meter.one_minute_rate(),
                meter.five_minute_rate(),
                meter.fifteen_minute_rate(),
            ]);
        },
        Metric::Timer(timer) => {
            metered(families, base, labels, [
                timer.mean_rate(),
                timer.one_minute_rate(),
                timer.five_minute_rate(),
                timer.fifteen_minute_rate(),
            ]);
            let seconds = UnitMapping::nanos_to_seconds();
            let sum = seconds.scale.apply(nanos(timer.elapsed_time()));
            sampling(
                families,
                base,
                help,
                labels,
                &seconds,
                &timer.snapshot(),
                timer.count(),
                sum,
            );
        },
        Metric::SimpleTimer(timer) => {
            counting(families, base, help, labels, timer.count());
            let seconds = UnitMapping::nanos_to_seconds();
            let to_seconds = |d: Option<Duration>| d.map_or(f64::NAN, |d| seconds.scale.apply(nanos(d)));
            let suffix = seconds.suffix();
            families.single(
                &format!("{base}_elapsedTime{suffix}"),
                Kind::Gauge,
                None,
                labels,
                to_seconds(Some(timer.elapsed_time())),
            );
            families.single(
                &format!("{base}_maxTimeDuration{suffix}"),
                Kind::Gauge,
                None,
                labels,
                to_seconds(timer.max_time_duration()),
            );
            families.single(
                &format!("{base}_minTimeDuration{suffix}"),
                Kind::Gauge,
                None,
                labels,
                to_seconds(timer.min_time_duration()),
            );
        },
        Metric::ConcurrentGauge(gauge) => {
            families.single(
                &format!("{base}_current"),
                Kind::Gauge,
                help,
                labels,
                gauge.count() as f64,
            );
            families.single(&format!("{base}_min"), Kind::Gauge, None, labels, gauge.min() as f64);
            families.single(&format!("{base}_max"), Kind::Gauge, None, labels, gauge.max() as f64);
        },
    }
}

fn counting(families: &mut Families, base: &str, help: Option<&str>, labels: &Labels, count: u64) {
    families.single(&format!("{base}_total"), Kind::Counter, help, labels, count as f64);
}

fn metered(families: &mut Families, base: &str, labels: &Labels, rates: [f64; 4]) {
    let names = ["rate", "one_min_rate", "five_min_rate", "fifteen_min_rate"];
    for (name, rate) in names.into_iter().zip(rates) {
        let line = format!("{base}_{name}_{}", units::PER_SECOND);
        families.single(&line, Kind::Gauge, None, labels, rate);
    }
}

#[allow(clippy::too_many_arguments)]
fn sampling(
    families: &mut Families,
    base: &str,
    help: Option<&str>,
    labels: &Labels,
    unit: &UnitMapping,
    snapshot: &Snapshot,
    count: u64,
    sum: f64,
) {
    let suffix = unit.suffix();
    let scale: Scale = unit.scale;
    for (stat, value) in [
        ("mean", snapshot.mean()),
        ("max", snapshot.max() as f64),
        ("min", snapshot.min() as f64),
        ("stddev", snapshot.stddev()),
    ] {
        let name = format!("{base}_{stat}{suffix}");
        families.single(&name, Kind::Gauge, None, labels, scale.apply(value));
    }

    let name = format!("{base}{suffix}");
    let family = families.family(&name, Kind::Summary, help);
    family.push(&format!("{name}_count"), labels.base.clone(), count as f64);
    family.push(&format!("{name}_sum"), labels.base.clone(), sum);
    for (quantile, read) in QUANTILES {
        family.push(&name, labels.with_quantile(quantile), scale.apply(read(snapshot)));
    }
}

fn nanos(duration: Duration) -> f64 {
    duration.as_nanos() as f64
}

/// Replace anything outside `[a-zA-Z0-9_]` with `_` and collapse runs of `_`.
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if c.is_ascii_alphanumeric() { c } else { '_' };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out
}

/// A label name matching `[a-zA-Z_][a-zA-Z0-9_]*`.
fn label_name(name: &str) -> String {
    let name = sanitize(name);
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{name}")
    } else {
        name
    }
}

fn escape_label_value(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn escape_help(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\n', "\\n")
}

fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v.is_sign_positive() { "+Inf" } else { "-Inf" }.to_string()
    } else if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v}")
    }
}
