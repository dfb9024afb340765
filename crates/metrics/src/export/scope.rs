//! Resolution of an export request path against the registry set.

use std::sync::Arc;

use crate::{
    registries::{Registries, STANDARD},
    registry::MetricRegistry,
};

/// What an export request covers.
#[derive(Debug, Clone)]
pub enum ExportScope {
    /// Every non-empty registry: the standard ones in standard order, then
    /// the rest by name.
    All(Vec<Arc<MetricRegistry>>),
    Registry(Arc<MetricRegistry>),
    /// Every id sharing `name` in one registry.
    Metric {
        registry: Arc<MetricRegistry>,
        name: String,
    },
    NotFound,
    NoContent,
}

impl ExportScope {
    /// Resolve `""`, `"/<registry>"` or `"/<registry>/<metric>"`.
    pub fn resolve(registries: &Registries, path: &str) -> Self {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let (registry, metric) = (segments.next(), segments.next());
        if segments.next().is_some() {
            return Self::NotFound;
        }

        let Some(registry_name) = registry else {
            let names = registries.names();
            let custom = names.iter().filter(|name| !STANDARD.contains(&name.as_str()));
            let populated: Vec<_> = STANDARD
                .into_iter()
                .chain(custom.map(String::as_str))
                .filter_map(|name| registries.get(name))
                .filter(|r| !r.is_empty())
                .collect();
            return if populated.is_empty() {
                Self::NoContent
            } else {
                Self::All(populated)
            };
        };

        let Some(registry) = registries.get(registry_name) else {
            return Self::NotFound;
        };
        match metric {
            None if registry.is_empty() => Self::NoContent,
            None => Self::Registry(registry),
            Some(name) if registry.metadata(name).is_some() => Self::Metric {
                registry,
                name: name.to_string(),
            },
            Some(_) if registry.is_empty() => Self::NoContent,
            Some(_) => Self::NotFound,
        }
    }

    /// Whether there is anything to render.
    pub fn has_content(&self) -> bool {
        matches!(self, Self::All(_) | Self::Registry(_) | Self::Metric { .. })
    }
}
