//! Fixed-delay scheduling shared by every push reporter.

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    chrono::Utc,
    tally_metrics::{JsonExporter, MetricsPayload, Registries, ServiceIdentity},
    tokio::{
        sync::watch,
        task::JoinHandle,
        time::{MissedTickBehavior, interval},
    },
    tokio_util::sync::CancellationToken,
    tracing::{error, info},
};

use crate::{backoff::Backoff, error::Result};

/// One push destination. Called once per tick with the enabled registries.
#[async_trait]
pub trait Report: Send {
    /// Short name used in logs, e.g. `graphite`.
    fn name(&self) -> &'static str;

    async fn report(&mut self, payload: &MetricsPayload) -> Result<()>;

    /// Release the connection, if any. Called once after the last tick.
    async fn close(&mut self) {}
}

/// Everything a reporter loop reads on each tick.
#[derive(Debug, Clone)]
pub struct ReportSource {
    pub registries: Arc<Registries>,
    pub identity: ServiceIdentity,
    pub exporter: JsonExporter,
}

impl ReportSource {
    fn collect(&self, names: &BTreeSet<String>) -> MetricsPayload {
        MetricsPayload::collect(
            &self.registries,
            names,
            &self.identity,
            &self.exporter,
            Utc::now(),
        )
    }
}

/// Schedule knobs for one reporter.
#[derive(Debug, Clone)]
pub struct Schedule {
    pub period: Duration,
    pub backoff: Backoff,
}

/// A running reporter. Dropping the handle leaves the task running; call
/// [`ReporterHandle::stop`] to cancel future ticks.
#[derive(Debug)]
pub struct ReporterHandle {
    name: &'static str,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ReporterHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Cancel future ticks and wait for an in-flight send to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!(reporter = self.name, error = %e, "reporter task failed");
        }
    }
}

/// Spawn `reporter` on a fixed-delay schedule.
///
/// The first tick fires immediately. The working set follows the enabled
/// registries without restarting the schedule.
pub fn spawn<R>(reporter: R, source: ReportSource, schedule: Schedule) -> ReporterHandle
where
    R: Report + 'static,
{
    let name = reporter.name();
    let cancel = CancellationToken::new();
    let enabled = source.registries.enabled().subscribe();
    let task = tokio::spawn(run(reporter, source, schedule, enabled, cancel.clone()));
    ReporterHandle { name, cancel, task }
}

async fn run<R: Report>(
    mut reporter: R,
    source: ReportSource,
    schedule: Schedule,
    mut enabled: watch::Receiver<BTreeSet<String>>,
    cancel: CancellationToken,
) {
    let name = reporter.name();
    let Schedule { period, mut backoff } = schedule;

    let mut working = enabled.borrow_and_update().clone();
    for registry in &working {
        info!(reporter = name, registry = %registry, "starting reporter for registry");
    }

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            Ok(()) = enabled.changed() => {
                let next = enabled.borrow_and_update().clone();
                log_working_set_change(name, &working, &next);
                working = next;
            },
            _ = ticker.tick() => {
                let payload = source.collect(&working);
                match reporter.report(&payload).await {
                    Ok(()) => backoff.reset(),
                    Err(e) => {
                        let delay = backoff.fail();
                        error!(
                            reporter = name,
                            error = %e,
                            retry_in_ms = delay.as_millis() as u64,
                            "failed to send metrics"
                        );
                        tokio::select! {
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(delay) => {},
                        }
                    },
                }
            },
        }
    }

    reporter.close().await;
    for registry in &working {
        info!(reporter = name, registry = %registry, "stopping reporter for registry");
    }
}

fn log_working_set_change(name: &str, old: &BTreeSet<String>, new: &BTreeSet<String>) {
    for registry in old.difference(new) {
        info!(reporter = name, registry = %registry, "stopping reporter for registry");
    }
    for registry in new.difference(old) {
        info!(reporter = name, registry = %registry, "starting reporter for registry");
    }
}
