pub mod json;
pub mod metadata;
pub mod prometheus;
pub mod scope;
pub mod units;

pub use {
    json::JsonExporter, metadata::MetadataExporter, prometheus::PrometheusExporter,
    scope::ExportScope,
};
