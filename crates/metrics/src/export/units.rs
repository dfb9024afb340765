//! Unit handling for Prometheus output: base-unit conversion and the name
//! suffix that advertises it.

use crate::metadata::units;

/// How a value in the declared unit maps onto the exported base unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scale {
    /// Exported as recorded.
    Identity,
    /// Divided by the factor. Used for sub-second units so that e.g. 5 ms
    /// renders as exactly `0.005`.
    Divide(f64),
    Multiply(f64),
}

impl Scale {
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Self::Identity => value,
            Self::Divide(factor) => value / factor,
            Self::Multiply(factor) => value * factor,
        }
    }
}

/// Conversion and name suffix for a declared unit.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitMapping {
    pub scale: Scale,
    pub suffix: Option<String>,
}

const SECONDS_SUFFIX: &str = "_seconds";
const BYTES_SUFFIX: &str = "_bytes";
const PERCENT_SUFFIX: &str = "_percent";

impl UnitMapping {
    /// Durations recorded in nanoseconds, exported in seconds.
    #[must_use]
    pub fn nanos_to_seconds() -> Self {
        Self::resolve(units::NANOSECONDS)
    }

    #[must_use]
    pub fn resolve(unit: &str) -> Self {
        let unit = unit.trim();
        let (scale, suffix) = match unit {
            "" | units::NONE => {
                return Self {
                    scale: Scale::Identity,
                    suffix: None,
                };
            },
            units::NANOSECONDS => (Scale::Divide(1e9), SECONDS_SUFFIX),
            units::MICROSECONDS => (Scale::Divide(1e6), SECONDS_SUFFIX),
            units::MILLISECONDS => (Scale::Divide(1e3), SECONDS_SUFFIX),
            units::SECONDS => (Scale::Identity, SECONDS_SUFFIX),
            units::MINUTES => (Scale::Multiply(60.0), SECONDS_SUFFIX),
            units::HOURS => (Scale::Multiply(3_600.0), SECONDS_SUFFIX),
            units::DAYS => (Scale::Multiply(86_400.0), SECONDS_SUFFIX),
            units::BITS => (Scale::Divide(8.0), BYTES_SUFFIX),
            units::BYTES => (Scale::Identity, BYTES_SUFFIX),
            units::KILOBYTES => (Scale::Multiply(1_024.0), BYTES_SUFFIX),
            units::MEGABYTES => (Scale::Multiply(1_048_576.0), BYTES_SUFFIX),
            units::GIGABYTES => (Scale::Multiply(1_073_741_824.0), BYTES_SUFFIX),
            units::KILOBITS => (Scale::Multiply(125.0), BYTES_SUFFIX),
            units::MEGABITS => (Scale::Multiply(125_000.0), BYTES_SUFFIX),
            units::GIGABITS => (Scale::Multiply(125_000_000.0), BYTES_SUFFIX),
            units::KIBIBITS => (Scale::Multiply(128.0), BYTES_SUFFIX),
            units::MEBIBITS => (Scale::Multiply(131_072.0), BYTES_SUFFIX),
            units::GIBIBITS => (Scale::Multiply(134_217_728.0), BYTES_SUFFIX),
            units::PERCENT => (Scale::Identity, PERCENT_SUFFIX),
            other => {
                return Self {
                    scale: Scale::Identity,
                    suffix: Some(format!("_{other}")),
                };
            },
        };
        Self {
            scale,
            suffix: Some(suffix.to_string()),
        }
    }

    pub fn suffix(&self) -> &str {
        self.suffix.as_deref().unwrap_or("")
    }
}
