//! Configuration loading, validation, and env substitution.
//!
//! Config files: `tally.toml`, `tally.yaml`, or `tally.json`
//! Searched in `./` then `~/.config/tally/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution in all values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{config_dir, discover_and_load, load_config, load_config_value},
    schema::{
        GraphiteConfig, LogsConfig, LogstashConfig, MetricsConfig, ReportersConfig,
        ServiceConfig, TallyConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate, validate_config, validate_str},
};
