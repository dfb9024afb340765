//! Config schema types (service identity, metrics, reporters).

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TallyConfig {
    pub service: ServiceConfig,
    pub metrics: MetricsConfig,
    pub reporters: ReportersConfig,
}

/// Identity attached to every pushed payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub version: String,
    pub environment: String,
    /// Defaults to a fresh UUID for every process.
    pub instance_id: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "UNKNOWN".into(),
            version: "1.0.0".into(),
            environment: "dev".into(),
            instance_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Registry and tagging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Registries covered by push reporters. Empty means every registry,
    /// including ones created later.
    pub enabled_registries: Vec<String>,
    /// `k=v,k2=v2`, with `\,` and `\=` escaping inside values.
    pub global_tags: String,
    /// Added to every metric as the `_app` tag.
    pub app_name: Option<String>,
    /// Register process gauges (memory, CPU, uptime).
    pub base_metrics: bool,
    pub base_registry_name: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled_registries: Vec::new(),
            global_tags: String::new(),
            app_name: None,
            base_metrics: true,
            base_registry_name: "base".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportersConfig {
    pub graphite: GraphiteConfig,
    pub logstash: LogstashConfig,
    pub logs: LogsConfig,
}

/// Push to a Graphite (carbon) listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphiteConfig {
    pub enabled: bool,
    pub address: String,
    pub port: u16,
    pub period_s: u64,
    /// Use the pickle protocol instead of plaintext lines.
    pub pickle: bool,
    pub start_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
}

impl Default for GraphiteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "127.0.0.1".into(),
            port: 2003,
            period_s: default_period_s(),
            pickle: false,
            start_retry_delay_ms: default_start_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
        }
    }
}

/// Push line-delimited JSON to a Logstash TCP input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogstashConfig {
    pub enabled: bool,
    pub address: String,
    pub port: u16,
    pub period_s: u64,
    pub start_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
}

impl Default for LogstashConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "127.0.0.1".into(),
            port: 5000,
            period_s: default_period_s(),
            start_retry_delay_ms: default_start_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
        }
    }
}

/// Emit the payload through the process log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsConfig {
    pub enabled: bool,
    pub period_s: u64,
    /// `trace`, `debug`, `info`, `warn` or `error`.
    pub level: String,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            period_s: default_period_s(),
            level: "debug".into(),
        }
    }
}

fn default_period_s() -> u64 {
    60
}

fn default_start_retry_delay_ms() -> u64 {
    500
}

fn default_max_retry_delay_ms() -> u64 {
    900_000
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config: TallyConfig = toml::from_str("").unwrap();
        assert_eq!(config.service.name, "UNKNOWN");
        assert_eq!(config.reporters.graphite.port, 2003);
        assert_eq!(config.reporters.logstash.port, 5000);
        assert_eq!(config.reporters.logstash.max_retry_delay_ms, 900_000);
        assert!(config.metrics.base_metrics);
        assert!(uuid::Uuid::parse_str(&config.service.instance_id).is_ok());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let raw = r#"
            [reporters.logstash]
            enabled = true
            port = 5044
        "#;
        let config: TallyConfig = toml::from_str(raw).unwrap();
        assert!(config.reporters.logstash.enabled);
        assert_eq!(config.reporters.logstash.port, 5044);
        assert_eq!(config.reporters.logstash.period_s, 60);
        assert!(!config.reporters.graphite.enabled);
    }
}
