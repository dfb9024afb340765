//! The document push reporters send: service identity plus the JSON shape of
//! each enabled registry.

use std::collections::{BTreeMap, BTreeSet};

use {
    chrono::{DateTime, SecondsFormat, Utc},
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

use crate::{
    error::{Error, Result},
    export::json::JsonExporter,
    registries::Registries,
};

/// Who is reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceIdentity {
    pub environment: String,
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

impl Default for ServiceIdentity {
    fn default() -> Self {
        Self {
            environment: "dev".into(),
            name: "UNKNOWN".into(),
            version: "1.0.0".into(),
            instance_id: "UNKNOWN".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub timestamp: String,
    pub environment: String,
    pub service_name: String,
    pub service_version: String,
    pub instance_id: String,
    pub available_registries: BTreeSet<String>,
}

impl ServiceInfo {
    #[must_use]
    pub fn new(
        identity: &ServiceIdentity,
        at: DateTime<Utc>,
        available_registries: BTreeSet<String>,
    ) -> Self {
        Self {
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            environment: identity.environment.clone(),
            service_name: identity.name.clone(),
            service_version: identity.version.clone(),
            instance_id: identity.instance_id.clone(),
            available_registries,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsPayload {
    pub service: ServiceInfo,
    pub registries: BTreeMap<String, Value>,
}

impl MetricsPayload {
    /// Snapshot the named registries. Names with no registry are skipped.
    #[must_use]
    pub fn collect(
        registries: &Registries,
        names: &BTreeSet<String>,
        identity: &ServiceIdentity,
        exporter: &JsonExporter,
        at: DateTime<Utc>,
    ) -> Self {
        let documents: BTreeMap<String, Value> = names
            .iter()
            .filter_map(|name| registries.get(name))
            .map(|registry| (registry.name().to_string(), exporter.registry(&registry)))
            .collect();
        Self {
            service: ServiceInfo::new(identity, at, registries.names()),
            registries: documents,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::export("serializing metrics payload", e))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, chrono::TimeZone};

    #[test]
    fn payload_shape() {
        let registries = Registries::new();
        registries.application().counter("hits", &[]).unwrap().inc();
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        let names = BTreeSet::from(["application".to_string(), "missing".to_string()]);
        let payload = MetricsPayload::collect(
            &registries,
            &names,
            &ServiceIdentity::default(),
            &JsonExporter::default(),
            at,
        );
        let value: Value = serde_json::from_str(&payload.to_json().unwrap()).unwrap();
        assert_eq!(value["service"]["timestamp"], "2024-03-01T12:30:05.000Z");
        assert_eq!(value["service"]["serviceName"], "UNKNOWN");
        assert_eq!(value["service"]["availableRegistries"][0], "application");
        assert_eq!(value["registries"]["application"]["hits"], 1);
        assert!(value["registries"].get("missing").is_none());
    }
}
