//! Descriptive metadata shared by every tagged variant of a metric name.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Well-known unit strings.
pub mod units {
    pub const NONE: &str = "none";

    pub const NANOSECONDS: &str = "nanoseconds";
    pub const MICROSECONDS: &str = "microseconds";
    pub const MILLISECONDS: &str = "milliseconds";
    pub const SECONDS: &str = "seconds";
    pub const MINUTES: &str = "minutes";
    pub const HOURS: &str = "hours";
    pub const DAYS: &str = "days";

    pub const BITS: &str = "bits";
    pub const KILOBITS: &str = "kilobits";
    pub const MEGABITS: &str = "megabits";
    pub const GIGABITS: &str = "gigabits";
    pub const KIBIBITS: &str = "kibibits";
    pub const MEBIBITS: &str = "mebibits";
    pub const GIBIBITS: &str = "gibibits";
    pub const BYTES: &str = "bytes";
    pub const KILOBYTES: &str = "kilobytes";
    pub const MEGABYTES: &str = "megabytes";
    pub const GIGABYTES: &str = "gigabytes";

    pub const PERCENT: &str = "percent";
    pub const PER_SECOND: &str = "per_second";
}

/// The seven metric kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricType {
    #[serde(rename = "counter")]
    Counter,
    #[serde(rename = "gauge")]
    Gauge,
    #[serde(rename = "histogram")]
    Histogram,
    #[serde(rename = "meter")]
    Meter,
    #[serde(rename = "timer")]
    Timer,
    #[serde(rename = "simple timer")]
    SimpleTimer,
    #[serde(rename = "concurrent gauge")]
    ConcurrentGauge,
}

impl MetricType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::Histogram => "histogram",
            Self::Meter => "meter",
            Self::Timer => "timer",
            Self::SimpleTimer => "simple timer",
            Self::ConcurrentGauge => "concurrent gauge",
        }
    }

    /// Counter and Gauge export as a single value; everything else expands
    /// into named fields.
    pub fn is_composite(self) -> bool {
        !matches!(self, Self::Counter | Self::Gauge)
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata for a metric name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    name: String,
    display_name: Option<String>,
    description: Option<String>,
    unit: Option<String>,
    metric_type: MetricType,
    reusable: bool,
}

impl Metadata {
    #[must_use]
    pub fn builder(name: impl Into<String>, metric_type: MetricType) -> MetadataBuilder {
        MetadataBuilder {
            inner: Self {
                name: name.into(),
                display_name: None,
                description: None,
                unit: None,
                metric_type,
                reusable: false,
            },
        }
    }

    /// Metadata with nothing but a name and a kind.
    #[must_use]
    pub fn of(name: impl Into<String>, metric_type: MetricType) -> Self {
        Self::builder(name, metric_type).build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Falls back to the name when no display name was given.
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// Trimmed description, `None` when absent or blank.
    pub fn description(&self) -> Option<&str> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }

    /// Declared unit, `"none"` when unset.
    pub fn unit(&self) -> &str {
        self.unit
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(units::NONE)
    }

    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    pub fn is_reusable(&self) -> bool {
        self.reusable
    }

    /// Same kind and same unit.
    pub fn is_compatible_with(&self, other: &Self) -> bool {
        self.metric_type == other.metric_type && self.unit() == other.unit()
    }
}

#[must_use]
pub struct MetadataBuilder {
    inner: Metadata,
}

impl MetadataBuilder {
    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.inner.display_name = Some(display_name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.inner.description = Some(description.into());
        self
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.inner.unit = Some(unit.into());
        self
    }

    pub fn reusable(mut self, reusable: bool) -> Self {
        self.inner.reusable = reusable;
        self
    }

    pub fn build(self) -> Metadata {
        self.inner
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_in_display_name_and_unit() {
        let md = Metadata::builder("requests", MetricType::Counter)
            .description("   ")
            .build();
        assert_eq!(md.display_name(), "requests");
        assert_eq!(md.unit(), units::NONE);
        assert_eq!(md.description(), None);
        assert!(!md.is_reusable());
    }

    #[test]
    fn compatibility_requires_type_and_unit() {
        let ms = Metadata::builder("t", MetricType::Timer)
            .unit(units::MILLISECONDS)
            .build();
        let s = Metadata::builder("t", MetricType::Timer)
            .unit(units::SECONDS)
            .build();
        assert!(ms.is_compatible_with(&ms.clone()));
        assert!(!ms.is_compatible_with(&s));
        assert!(!ms.is_compatible_with(&Metadata::of("t", MetricType::Histogram)));
    }

    #[test]
    fn type_names_match_wire_form() {
        assert_eq!(
            serde_json::to_string(&MetricType::ConcurrentGauge).unwrap(),
            "\"concurrent gauge\""
        );
        assert_eq!(MetricType::SimpleTimer.to_string(), "simple timer");
        assert!(!MetricType::Gauge.is_composite());
        assert!(MetricType::Meter.is_composite());
    }
}
