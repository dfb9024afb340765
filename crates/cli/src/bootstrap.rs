//! Builds the registry set and service identity from a loaded config.

use std::{path::Path, sync::Arc};

use {
    tally_config::TallyConfig,
    tally_metrics::{GlobalTags, Registries, ServiceIdentity, SystemClock},
    tracing::debug,
};

use crate::base_metrics;

/// Everything the commands need to export or push metrics.
#[derive(Debug, Clone)]
pub struct Telemetry {
    pub registries: Arc<Registries>,
    pub identity: ServiceIdentity,
    pub global_tags: GlobalTags,
}

/// Load `path` when given, otherwise discover the config file.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<TallyConfig> {
    match path {
        Some(path) => tally_config::load_config(path),
        None => Ok(tally_config::discover_and_load()),
    }
}

pub fn build(config: &TallyConfig) -> anyhow::Result<Telemetry> {
    let metrics = &config.metrics;
    let global_tags = GlobalTags::parse(&metrics.global_tags, metrics.app_name.as_deref())?;
    let registries = Arc::new(Registries::with_clock(
        SystemClock::shared(),
        &metrics.enabled_registries,
    ));

    if metrics.base_metrics {
        let base = registries.get_or_create(&metrics.base_registry_name);
        base_metrics::register(&base)?;
        debug!(registry = base.name(), "registered process metrics");
    }

    let service = &config.service;
    Ok(Telemetry {
        registries,
        identity: ServiceIdentity {
            environment: service.environment.clone(),
            name: service.name.clone(),
            version: service.version.clone(),
            instance_id: service.instance_id.clone(),
        },
        global_tags,
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_metrics_land_in_the_configured_registry() {
        let mut config = TallyConfig::default();
        config.metrics.base_registry_name = "process".into();
        let telemetry = build(&config).unwrap();
        let process = telemetry.registries.get("process").unwrap();
        assert!(process.metadata("memory.rss").is_some());
        assert!(telemetry.registries.base().is_empty());
    }

    #[test]
    fn base_metrics_can_be_turned_off() {
        let mut config = TallyConfig::default();
        config.metrics.base_metrics = false;
        let telemetry = build(&config).unwrap();
        assert!(telemetry.registries.base().is_empty());
    }

    #[test]
    fn malformed_global_tags_fail_the_build() {
        let mut config = TallyConfig::default();
        config.metrics.global_tags = "novalue".into();
        assert!(build(&config).is_err());
    }

    #[test]
    fn loads_an_explicit_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tally.toml");
        std::fs::write(
            &path,
            "[service]\nname = \"orders\"\n\n[metrics]\napp_name = \"shop\"\n",
        )
        .unwrap();
        let config = load_config(Some(path.as_path())).unwrap();
        let telemetry = build(&config).unwrap();
        assert_eq!(telemetry.identity.name, "orders");
        assert_eq!(telemetry.global_tags.tags()[0].value(), "shop");
    }
}
