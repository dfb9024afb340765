use {anyhow::Result, clap::ValueEnum};

use tally_metrics::{ExportScope, JsonExporter, MetadataExporter, PrometheusExporter};

use crate::bootstrap::Telemetry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Grouped metric values.
    Json,
    /// Unit, type, description and tags per metric.
    Metadata,
    /// Prometheus text exposition.
    Prometheus,
}

pub fn handle_render(telemetry: &Telemetry, format: Format, path: &str) -> Result<()> {
    let scope = ExportScope::resolve(&telemetry.registries, path);
    if matches!(scope, ExportScope::NotFound) {
        anyhow::bail!("no registry or metric at '{path}'");
    }
    match render(telemetry, format, &scope)? {
        Some(text) => println!("{text}"),
        None => eprintln!("No metrics to report."),
    }
    Ok(())
}

/// `None` when the scope has nothing to render.
pub fn render(telemetry: &Telemetry, format: Format, scope: &ExportScope) -> Result<Option<String>> {
    let tags = telemetry.global_tags.clone();
    let output = match format {
        Format::Json => JsonExporter::new(tags).render(scope)?,
        Format::Metadata => MetadataExporter::new(tags).render(scope)?,
        Format::Prometheus => PrometheusExporter::new(tags).render(scope),
    };
    Ok(output)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::bootstrap,
        rstest::rstest,
        tally_config::TallyConfig,
    };

    fn telemetry() -> Telemetry {
        let mut config = TallyConfig::default();
        config.metrics.base_metrics = false;
        config.metrics.global_tags = "dc=eu".into();
        let telemetry = bootstrap::build(&config).unwrap();
        telemetry
            .registries
            .application()
            .counter("orders", &[])
            .unwrap()
            .inc_by(2);
        telemetry
    }

    #[rstest]
    #[case(Format::Json, "\"orders;dc=eu\": 2")]
    #[case(Format::Metadata, "\"dc=eu\"")]
    #[case(Format::Prometheus, "application_orders_total{dc=\"eu\"} 2")]
    fn renders_each_format(#[case] format: Format, #[case] needle: &str) {
        let telemetry = telemetry();
        let scope = ExportScope::resolve(&telemetry.registries, "/application");
        let text = render(&telemetry, format, &scope).unwrap().unwrap();
        assert!(text.contains(needle), "{text}");
    }

    #[test]
    fn empty_registry_renders_nothing() {
        let telemetry = telemetry();
        let scope = ExportScope::resolve(&telemetry.registries, "/vendor");
        assert!(render(&telemetry, Format::Json, &scope).unwrap().is_none());
    }

    #[test]
    fn full_render_includes_a_renamed_base_registry() {
        let mut config = TallyConfig::default();
        config.metrics.base_registry_name = "process".into();
        let telemetry = bootstrap::build(&config).unwrap();
        let scope = ExportScope::resolve(&telemetry.registries, "");
        let text = render(&telemetry, Format::Json, &scope).unwrap().unwrap();
        assert!(text.contains("\"process\": {"), "{text}");
        assert!(text.contains("memory.rss"), "{text}");
    }

    #[test]
    fn unknown_path_is_an_error() {
        let telemetry = telemetry();
        assert!(handle_render(&telemetry, Format::Json, "/nope").is_err());
    }
}
