//! Configuration validation engine.
//!
//! Detects unknown or misspelled fields, type errors, and values the
//! reporters cannot run with.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use tally_metrics::GlobalTags;

use crate::{
    loader::{find_config_file, parse_config, parse_config_value},
    schema::TallyConfig,
};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "value", "network",
    /// "file-ref"
    pub category: &'static str,
    /// Dotted path, e.g. "reporters.graphite.port"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn error(category: &'static str, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

// ── Schema tree for unknown-field detection ─────────────────────────────────

enum KnownKeys {
    Struct(HashMap<&'static str, KnownKeys>),
    Leaf,
}

fn build_schema_map() -> KnownKeys {
    use KnownKeys::{Leaf, Struct};

    let endpoint = |extra: &[&'static str]| {
        let mut fields = HashMap::from([
            ("enabled", Leaf),
            ("address", Leaf),
            ("port", Leaf),
            ("period_s", Leaf),
            ("start_retry_delay_ms", Leaf),
            ("max_retry_delay_ms", Leaf),
        ]);
        for key in extra {
            fields.insert(*key, Leaf);
        }
        Struct(fields)
    };

    Struct(HashMap::from([
        (
            "service",
            Struct(HashMap::from([
                ("name", Leaf),
                ("version", Leaf),
                ("environment", Leaf),
                ("instance_id", Leaf),
            ])),
        ),
        (
            "metrics",
            Struct(HashMap::from([
                ("enabled_registries", Leaf),
                ("global_tags", Leaf),
                ("app_name", Leaf),
                ("base_metrics", Leaf),
                ("base_registry_name", Leaf),
            ])),
        ),
        (
            "reporters",
            Struct(HashMap::from([
                ("graphite", endpoint(&["pickle"])),
                ("logstash", endpoint(&[])),
                (
                    "logs",
                    Struct(HashMap::from([
                        ("enabled", Leaf),
                        ("period_s", Leaf),
                        ("level", Leaf),
                    ])),
                ),
            ])),
        ),
    ]))
}

// ── Levenshtein distance ────────────────────────────────────────────────────

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

/// Closest candidate within `max_distance` edits, if any.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    let mut best: Option<(&'a str, usize)> = None;
    for &candidate in candidates {
        let d = levenshtein(needle, candidate);
        if d > 0 && d <= max_distance && best.as_ref().is_none_or(|(_, bd)| d < *bd) {
            best = Some((candidate, d));
        }
    }
    best.map(|(s, _)| s)
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate a config file at the given path, or discover the default config
/// file location if `path` is `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = path.map(Path::to_path_buf).or_else(find_config_file);

    let Some(actual_path) = config_path else {
        return ValidationResult {
            diagnostics: vec![Diagnostic {
                severity: Severity::Info,
                category: "file-ref",
                path: String::new(),
                message: "no config file found; using defaults".into(),
            }],
            config_path: None,
        };
    };

    match std::fs::read_to_string(&actual_path) {
        Ok(content) => {
            let content = crate::env_subst::substitute_env(&content);
            let mut result = validate_str(&content, &actual_path);
            result.config_path = Some(actual_path);
            result
        },
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic::error(
                "syntax",
                "",
                format!("failed to read config file: {e}"),
            )],
            config_path: Some(actual_path),
        },
    }
}

/// Validate raw config text; the format follows `path`'s extension.
#[must_use]
pub fn validate_str(raw: &str, path: &Path) -> ValidationResult {
    let mut diagnostics = Vec::new();

    let value = match parse_config_value(raw, path) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic::error("syntax", "", format!("syntax error: {e}")));
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    check_unknown_fields(&value, &build_schema_map(), "", &mut diagnostics);

    match parse_config(raw, path) {
        Ok(config) => diagnostics.extend(validate_config(&config).diagnostics),
        Err(e) => diagnostics.push(Diagnostic::error("type-error", "", format!("type error: {e}"))),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

/// Semantic checks on an already parsed config.
#[must_use]
pub fn validate_config(config: &TallyConfig) -> ValidationResult {
    let mut diagnostics = Vec::new();
    let reporters = &config.reporters;

    if let Err(e) = GlobalTags::parse(&config.metrics.global_tags, config.metrics.app_name.as_deref())
    {
        diagnostics.push(Diagnostic::error("value", "metrics.global_tags", e.to_string()));
    }

    let endpoints = [
        (
            "graphite",
            reporters.graphite.enabled,
            reporters.graphite.address.as_str(),
            reporters.graphite.port,
            reporters.graphite.period_s,
            reporters.graphite.start_retry_delay_ms,
            reporters.graphite.max_retry_delay_ms,
        ),
        (
            "logstash",
            reporters.logstash.enabled,
            reporters.logstash.address.as_str(),
            reporters.logstash.port,
            reporters.logstash.period_s,
            reporters.logstash.start_retry_delay_ms,
            reporters.logstash.max_retry_delay_ms,
        ),
    ];
    for (name, enabled, address, port, period_s, start_ms, max_ms) in endpoints {
        let prefix = format!("reporters.{name}");
        if period_s == 0 {
            diagnostics.push(Diagnostic::error(
                "value",
                format!("{prefix}.period_s"),
                "period must be at least one second",
            ));
        }
        if port == 0 {
            diagnostics.push(Diagnostic::error("value", format!("{prefix}.port"), "port must not be 0"));
        }
        if start_ms > max_ms {
            diagnostics.push(Diagnostic::error(
                "value",
                format!("{prefix}.start_retry_delay_ms"),
                format!("start retry delay {start_ms}ms exceeds the maximum {max_ms}ms"),
            ));
        }
        if enabled && !is_loopback(address) && period_s > 0 && period_s < 5 {
            diagnostics.push(Diagnostic {
                severity: Severity::Warning,
                category: "network",
                path: format!("{prefix}.period_s"),
                message: format!("pushing to remote {address} every {period_s}s"),
            });
        }
    }

    if reporters.logs.period_s == 0 {
        diagnostics.push(Diagnostic::error(
            "value",
            "reporters.logs.period_s",
            "period must be at least one second",
        ));
    }
    if reporters.logs.level.parse::<tracing::Level>().is_err() {
        let levels = ["trace", "debug", "info", "warn", "error"];
        let message = match suggest(&reporters.logs.level.to_lowercase(), &levels, 2) {
            Some(s) => format!("unknown log level (did you mean \"{s}\"?)"),
            None => "unknown log level".to_string(),
        };
        diagnostics.push(Diagnostic::error("value", "reporters.logs.level", message));
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn is_loopback(address: &str) -> bool {
    matches!(address, "127.0.0.1" | "localhost" | "::1")
}

/// Walk the value tree against the schema tree and flag unknown keys.
fn check_unknown_fields(
    value: &serde_json::Value,
    schema: &KnownKeys,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let (serde_json::Value::Object(table), KnownKeys::Struct(fields)) = (value, schema) else {
        return;
    };
    let known_keys: Vec<&str> = fields.keys().copied().collect();
    for (key, child_value) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        if let Some(child_schema) = fields.get(key.as_str()) {
            check_unknown_fields(child_value, child_schema, &path, diagnostics);
        } else {
            let level = if prefix.is_empty() {
                "at top level "
            } else {
                ""
            };
            let msg = match suggest(key, &known_keys, 3) {
                Some(s) => format!("unknown field {level}(did you mean \"{s}\"?)"),
                None => format!("unknown field {level}"),
            };
            diagnostics.push(Diagnostic::error("unknown-field", path, msg.trim()));
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    fn toml(raw: &str) -> ValidationResult {
        validate_str(raw, Path::new("tally.toml"))
    }

    #[test]
    fn defaults_are_clean() {
        let result = validate_config(&TallyConfig::default());
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    }

    #[test]
    fn misspelled_field_gets_a_suggestion() {
        let result = toml("[reporters.graphite]\nprot = 2003\n");
        let diag = &result.diagnostics[0];
        assert_eq!(diag.category, "unknown-field");
        assert_eq!(diag.path, "reporters.graphite.prot");
        assert!(diag.message.contains("did you mean \"port\""));
    }

    #[test]
    fn syntax_errors_stop_validation() {
        let result = toml("[service\n");
        assert_eq!(result.count(Severity::Error), 1);
        assert_eq!(result.diagnostics[0].category, "syntax");
    }

    #[test]
    fn type_errors_are_reported() {
        let result = toml("[reporters.logstash]\nport = \"five\"\n");
        assert!(result.diagnostics.iter().any(|d| d.category == "type-error"));
    }

    #[rstest]
    #[case::zero_period("[reporters.graphite]\nperiod_s = 0\n", "reporters.graphite.period_s")]
    #[case::zero_port("[reporters.logstash]\nport = 0\n", "reporters.logstash.port")]
    #[case::retry_bounds(
        "[reporters.logstash]\nstart_retry_delay_ms = 10\nmax_retry_delay_ms = 5\n",
        "reporters.logstash.start_retry_delay_ms"
    )]
    #[case::log_level("[reporters.logs]\nlevel = \"loud\"\n", "reporters.logs.level")]
    #[case::global_tags("[metrics]\nglobal_tags = \"1bad=x\"\n", "metrics.global_tags")]
    fn semantic_errors(#[case] raw: &str, #[case] path: &str) {
        let result = toml(raw);
        assert!(result.has_errors());
        assert!(
            result
                .diagnostics
                .iter()
                .any(|d| d.severity == Severity::Error && d.path == path),
            "{:?}",
            result.diagnostics
        );
    }

    #[test]
    fn fast_remote_push_is_a_warning() {
        let result = toml("[reporters.graphite]\nenabled = true\naddress = \"10.0.0.5\"\nperiod_s = 1\n");
        assert!(!result.has_errors());
        assert_eq!(result.count(Severity::Warning), 1);
    }

    #[test]
    fn yaml_is_validated_too() {
        let result = validate_str("service:\n  nmae: x\n", Path::new("tally.yaml"));
        assert_eq!(result.diagnostics[0].path, "service.nmae");
    }

    #[test]
    fn validates_a_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tally.toml");
        std::fs::write(&path, "[reporters.logs]\nenabled = true\n").unwrap();
        let result = validate(Some(path.as_path()));
        assert_eq!(result.config_path.as_deref(), Some(path.as_path()));
        assert!(!result.has_errors());
    }
}
