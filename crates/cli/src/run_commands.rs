use std::{sync::Arc, time::Duration};

use {
    anyhow::Result,
    tally_config::{TallyConfig, validate::Severity},
    tally_metrics::JsonExporter,
    tally_reporters::{
        Backoff, GraphiteReporter, LogsReporter, LogstashReporter, ReportSource, ReporterHandle,
        Schedule, TcpSink, spawn,
    },
    tracing::{info, warn},
};

use crate::bootstrap::Telemetry;

/// Start every enabled reporter and block until Ctrl-C.
pub async fn handle_run(config: &TallyConfig, telemetry: &Telemetry) -> Result<()> {
    let handles = start_reporters(config, telemetry)?;
    if handles.is_empty() {
        warn!("no reporters enabled, nothing to do");
        return Ok(());
    }

    info!(reporters = handles.len(), "reporters running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutting down reporters");

    for handle in handles {
        handle.stop().await;
    }
    Ok(())
}

/// Spawn the reporters `config` enables. Must run inside a tokio runtime.
pub fn start_reporters(config: &TallyConfig, telemetry: &Telemetry) -> Result<Vec<ReporterHandle>> {
    let validation = tally_config::validate_config(config);
    if let Some(first) = validation
        .diagnostics
        .iter()
        .find(|d| d.severity == Severity::Error)
    {
        anyhow::bail!("invalid config at {}: {}", first.path, first.message);
    }

    let source = ReportSource {
        registries: Arc::clone(&telemetry.registries),
        identity: telemetry.identity.clone(),
        exporter: JsonExporter::new(telemetry.global_tags.clone()),
    };
    let reporters = &config.reporters;
    let mut handles = Vec::new();

    let graphite = &reporters.graphite;
    if graphite.enabled {
        let sink = TcpSink::new(graphite.address.clone(), graphite.port);
        let reporter = GraphiteReporter::new(sink, &telemetry.identity, graphite.pickle);
        handles.push(spawn(reporter, source.clone(), Schedule {
            period: Duration::from_secs(graphite.period_s),
            backoff: Backoff::from_millis(
                graphite.start_retry_delay_ms,
                graphite.max_retry_delay_ms,
            ),
        }));
        info!(
            address = %graphite.address,
            port = graphite.port,
            pickle = graphite.pickle,
            "graphite reporter started"
        );
    }

    let logstash = &reporters.logstash;
    if logstash.enabled {
        let sink = TcpSink::new(logstash.address.clone(), logstash.port);
        handles.push(spawn(LogstashReporter::new(sink), source.clone(), Schedule {
            period: Duration::from_secs(logstash.period_s),
            backoff: Backoff::from_millis(
                logstash.start_retry_delay_ms,
                logstash.max_retry_delay_ms,
            ),
        }));
        info!(address = %logstash.address, port = logstash.port, "logstash reporter started");
    }

    let logs = &reporters.logs;
    if logs.enabled {
        let reporter = LogsReporter::from_level_name(&logs.level)?;
        handles.push(spawn(reporter, source, Schedule {
            period: Duration::from_secs(logs.period_s),
            backoff: Backoff::default(),
        }));
        info!(level = %logs.level, "logs reporter started");
    }

    Ok(handles)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::bootstrap,
        tokio::{
            io::{AsyncBufReadExt, BufReader},
            net::TcpListener,
        },
    };

    fn config() -> TallyConfig {
        let mut config = TallyConfig::default();
        config.metrics.base_metrics = false;
        config
    }

    #[tokio::test]
    async fn nothing_enabled_starts_nothing() {
        let config = config();
        let telemetry = bootstrap::build(&config).unwrap();
        assert!(start_reporters(&config, &telemetry).unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_config_is_refused() {
        let mut config = config();
        config.reporters.logs.enabled = true;
        config.reporters.logs.period_s = 0;
        let telemetry = bootstrap::build(&config).unwrap();
        let err = start_reporters(&config, &telemetry).unwrap_err();
        assert!(err.to_string().contains("reporters.logs.period_s"));
    }

    #[tokio::test]
    async fn logstash_reporter_pushes_to_the_configured_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = config();
        config.service.name = "orders".into();
        config.reporters.logstash.enabled = true;
        config.reporters.logstash.port = listener.local_addr().unwrap().port();
        config.reporters.logs.enabled = true;

        let telemetry = bootstrap::build(&config).unwrap();
        telemetry.registries.application().counter("hits", &[]).unwrap().inc();
        let handles = start_reporters(&config, &telemetry).unwrap();
        assert_eq!(handles.len(), 2);

        let (socket, _) = listener.accept().await.unwrap();
        let line = BufReader::new(socket).lines().next_line().await.unwrap().unwrap();
        assert!(line.contains("\"serviceName\":\"orders\""));

        for handle in handles {
            handle.stop().await;
        }
    }
}
