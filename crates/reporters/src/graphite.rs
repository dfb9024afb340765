//! Graphite plaintext and pickle output.

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    serde_json::Value,
    tally_metrics::{MetricsPayload, ServiceIdentity},
};

use crate::{error::Result, scheduler::Report, sink::TcpSink};

/// Tuples per pickle frame.
pub const PICKLE_BATCH: usize = 100;

/// One `(path, value, timestamp)` data point.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub path: String,
    pub value: String,
    pub timestamp: i64,
}

/// `tally.<environment>.<service>.<version>.<instance>`, with dots inside
/// each component replaced by underscores.
#[must_use]
pub fn prefix(identity: &ServiceIdentity) -> String {
    [
        "tally",
        &identity.environment,
        &identity.name,
        &identity.version,
        &identity.instance_id,
    ]
    .iter()
    .map(|component| component.replace('.', "_"))
    .collect::<Vec<_>>()
    .join(".")
}

/// Flatten the payload into samples under `prefix`. Nulls and non-numeric
/// values are skipped.
#[must_use]
pub fn flatten(prefix: &str, payload: &MetricsPayload) -> Vec<Sample> {
    let timestamp = DateTime::parse_from_rfc3339(&payload.service.timestamp)
        .map(|at| at.timestamp())
        .unwrap_or_else(|_| Utc::now().timestamp());
    let mut samples = Vec::new();
    for (registry, document) in &payload.registries {
        flatten_value(&format!("{prefix}.{registry}"), document, timestamp, &mut samples);
    }
    samples
}

fn flatten_value(path: &str, value: &Value, timestamp: i64, out: &mut Vec<Sample>) {
    match value {
        Value::Number(number) => out.push(Sample {
            path: path.to_string(),
            value: number.to_string(),
            timestamp,
        }),
        Value::Object(fields) => {
            for (key, child) in fields {
                flatten_value(&format!("{path}.{key}"), child, timestamp, out);
            }
        },
        _ => {},
    }
}

/// `path value timestamp\n` per sample.
#[must_use]
pub fn encode_plaintext(samples: &[Sample]) -> Vec<u8> {
    let mut out = String::new();
    for sample in samples {
        out.push_str(&format!(
            "{} {} {}\n",
            sample.path, sample.value, sample.timestamp
        ));
    }
    out.into_bytes()
}

/// One length-prefixed protocol-0 pickle frame per batch of samples.
#[must_use]
pub fn encode_pickle(samples: &[Sample]) -> Vec<u8> {
    let mut out = Vec::new();
    for batch in samples.chunks(PICKLE_BATCH) {
        let body = pickle_batch(batch);
        let len = u32::try_from(body.len()).unwrap_or(u32::MAX);
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(&body);
    }
    out
}

/// `[(path, (timestamp, value)), ...]` using MARK/LIST, STRING, LONG,
/// TUPLE, APPEND and STOP opcodes.
fn pickle_batch(batch: &[Sample]) -> Vec<u8> {
    let mut body = String::from("(l");
    for sample in batch {
        body.push_str(&format!(
            "(S'{}'\n(L{}L\nS'{}'\ntta",
            pickle_escape(&sample.path),
            sample.timestamp,
            pickle_escape(&sample.value)
        ));
    }
    body.push('.');
    body.into_bytes()
}

fn pickle_escape(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Pushes the enabled registries to a Graphite carbon listener.
#[derive(Debug)]
pub struct GraphiteReporter {
    sink: TcpSink,
    prefix: String,
    pickle: bool,
}

impl GraphiteReporter {
    #[must_use]
    pub fn new(sink: TcpSink, identity: &ServiceIdentity, pickle: bool) -> Self {
        Self {
            sink,
            prefix: prefix(identity),
            pickle,
        }
    }
}

#[async_trait]
impl Report for GraphiteReporter {
    fn name(&self) -> &'static str {
        "graphite"
    }

    async fn report(&mut self, payload: &MetricsPayload) -> Result<()> {
        let samples = flatten(&self.prefix, payload);
        if samples.is_empty() {
            return Ok(());
        }
        let bytes = if self.pickle {
            encode_pickle(&samples)
        } else {
            encode_plaintext(&samples)
        };
        self.sink.send(&bytes).await
    }

    async fn close(&mut self) {
        self.sink.close().await;
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        serde_json::json,
        std::collections::{BTreeMap, BTreeSet},
        tally_metrics::ServiceInfo,
    };

    fn payload(registries: BTreeMap<String, Value>) -> MetricsPayload {
        let at = DateTime::parse_from_rfc3339("2024-03-01T12:00:00.000Z")
            .unwrap()
            .with_timezone(&Utc);
        MetricsPayload {
            service: ServiceInfo::new(&ServiceIdentity::default(), at, BTreeSet::new()),
            registries,
        }
    }

    #[test]
    fn prefix_replaces_dots_per_component() {
        let identity = ServiceIdentity {
            environment: "prod".into(),
            name: "orders.api".into(),
            version: "2.1.0".into(),
            instance_id: "i-1".into(),
        };
        assert_eq!(prefix(&identity), "tally.prod.orders_api.2_1_0.i-1");
    }

    #[test]
    fn flattens_groups_and_skips_non_numbers() {
        let payload = payload(BTreeMap::from([(
            "application".to_string(),
            json!({
                "hits": 3,
                "status": "green",
                "latency": { "count": 2, "maxTimeDuration": null },
                "sameName": { "count;test=1": 1 },
            }),
        )]));
        let paths: Vec<(String, String)> = flatten("p", &payload)
            .into_iter()
            .map(|s| (s.path, s.value))
            .collect();
        assert_eq!(paths, vec![
            ("p.application.hits".to_string(), "3".to_string()),
            ("p.application.latency.count".to_string(), "2".to_string()),
            ("p.application.sameName.count;test=1".to_string(), "1".to_string()),
        ]);
    }

    #[test]
    fn plaintext_lines() {
        let samples = vec![Sample {
            path: "a.b".into(),
            value: "1.5".into(),
            timestamp: 1_709_294_400,
        }];
        assert_eq!(encode_plaintext(&samples), b"a.b 1.5 1709294400\n");
    }

    #[test]
    fn pickle_frame_layout() {
        let samples = vec![Sample {
            path: "a.b".into(),
            value: "7".into(),
            timestamp: 10,
        }];
        let bytes = encode_pickle(&samples);
        let body = b"(l(S'a.b'\n(L10L\nS'7'\ntta.";
        assert_eq!(&bytes[..4], &(body.len() as u32).to_be_bytes());
        assert_eq!(&bytes[4..], body);
    }

    #[test]
    fn pickle_splits_into_batches() {
        let samples: Vec<Sample> = (0..PICKLE_BATCH + 1)
            .map(|i| Sample {
                path: format!("m{i}"),
                value: "1".into(),
                timestamp: 0,
            })
            .collect();
        let bytes = encode_pickle(&samples);
        let first = u32::from_be_bytes(bytes[..4].try_into().unwrap()) as usize;
        let rest = &bytes[4 + first..];
        let second = u32::from_be_bytes(rest[..4].try_into().unwrap()) as usize;
        assert_eq!(rest.len(), 4 + second);
        assert!(std::str::from_utf8(&rest[4..]).unwrap().contains("m100"));
    }
}
