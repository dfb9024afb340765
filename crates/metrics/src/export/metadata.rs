//! JSON description of what each metric name means.

use serde_json::{Map, Value, json};

use crate::{
    error::{Error, Result},
    export::scope::ExportScope,
    global_tags::GlobalTags,
    registry::{MergedMetadata, MetricRegistry},
};

/// Renders `{ name: { unit, type, description?, displayName, tags } }`.
#[derive(Debug, Clone, Default)]
pub struct MetadataExporter {
    global_tags: GlobalTags,
}

impl MetadataExporter {
    #[must_use]
    pub fn new(global_tags: GlobalTags) -> Self {
        Self { global_tags }
    }

    pub fn registry(&self, registry: &MetricRegistry) -> Value {
        Value::Object(
            registry
                .metadata_with_merged_tags()
                .into_iter()
                .map(|(name, merged)| (name, self.entry(&merged)))
                .collect(),
        )
    }

    pub fn metric(&self, registry: &MetricRegistry, name: &str) -> Value {
        let mut out = Map::new();
        if let Some(merged) = registry.metadata_with_merged_tags().remove(name) {
            out.insert(name.to_string(), self.entry(&merged));
        }
        Value::Object(out)
    }

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
                    .map_err(|e| Error::export("serializing metadata as JSON", e))
            })
            .transpose()
    }

    fn entry(&self, merged: &MergedMetadata) -> Value {
        let metadata = &merged.metadata;
        let tags: Vec<Vec<String>> = merged
            .tags
            .iter()
            .map(|set| {
                set.iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .chain(self.global_tags.tags().iter().map(ToString::to_string))
                    .collect()
            })
            .collect();

        let mut entry = Map::new();
        entry.insert("unit".into(), json!(metadata.unit()));
        entry.insert("type".into(), json!(metadata.metric_type()));
        if let Some(description) = metadata.description() {
            entry.insert("description".into(), json!(description));
        }
        entry.insert("displayName".into(), json!(metadata.display_name()));
        entry.insert("tags".into(), json!(tags));
        Value::Object(entry)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            id::Tag,
            metadata::{Metadata, MetricType, units},
        },
    };

    #[test]
    fn describes_each_name_once_with_all_tag_sets() {
        let registry = MetricRegistry::new("application");
        let md = Metadata::builder("latency", MetricType::Histogram)
            .unit(units::MILLISECONDS)
            .description("request latency")
            .display_name("Latency")
            .build();
        registry.histogram_with(md.clone(), &[Tag::new("route", "a")]).unwrap();
        registry.histogram_with(md, &[Tag::new("route", "b")]).unwrap();
        registry.counter("plain", &[]).unwrap();

        let global = GlobalTags::parse("env=prod", None).unwrap();
        let doc = MetadataExporter::new(global).registry(&registry);
        assert_eq!(
            doc["latency"],
            json!({
                "unit": "milliseconds",
                "type": "histogram",
                "description": "request latency",
                "displayName": "Latency",
                "tags": [["route=a", "env=prod"], ["route=b", "env=prod"]],
            })
        );
        assert_eq!(
            doc["plain"],
            json!({
                "unit": "none",
                "type": "counter",
                "displayName": "plain",
                "tags": [["env=prod"]],
            })
        );
    }

    #[test]
    fn single_metric_lookup() {
        let registry = MetricRegistry::new("vendor");
        registry.meter("m", &[]).unwrap();
        let exporter = MetadataExporter::default();
        assert_eq!(exporter.metric(&registry, "m")["m"]["type"], json!("meter"));
        assert_eq!(exporter.metric(&registry, "missing"), json!({}));
    }
}
