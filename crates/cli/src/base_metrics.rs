//! Process gauges for the base registry, sampled through `sysinfo` on read.

use std::{
    sync::{Arc, Mutex},
    time::Instant,
};

use {
    sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System},
    tally_metrics::{Metadata, MetricRegistry, MetricType, units},
};

#[derive(Debug, Default, Clone, Copy)]
struct ProcessSample {
    rss: u64,
    virtual_memory: u64,
    cpu_percent: f64,
}

/// One `System` shared by every gauge so CPU usage is measured between reads.
struct ProcessProbe {
    system: Mutex<System>,
    pid: Option<Pid>,
    started: Instant,
}

impl ProcessProbe {
    fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            pid: sysinfo::get_current_pid().ok(),
            started: Instant::now(),
        }
    }

    fn sample(&self) -> ProcessSample {
        let Some(pid) = self.pid else {
            return ProcessSample::default();
        };
        let mut system = self.system.lock().unwrap_or_else(|e| e.into_inner());
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            false,
            ProcessRefreshKind::nothing().with_memory().with_cpu(),
        );
        system
            .process(pid)
            .map(|process| ProcessSample {
                rss: process.memory(),
                virtual_memory: process.virtual_memory(),
                cpu_percent: f64::from(process.cpu_usage()),
            })
            .unwrap_or_default()
    }

    fn uptime_millis(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Register the process gauges into `registry`.
pub fn register(registry: &MetricRegistry) -> tally_metrics::Result<()> {
    let probe = Arc::new(ProcessProbe::new());

    let gauge = |name: &str, display: &str, unit: &str, description: &str| {
        Metadata::builder(name, MetricType::Gauge)
            .display_name(display)
            .description(description)
            .unit(unit)
            .build()
    };

    let p = Arc::clone(&probe);
    registry.gauge(
        gauge("memory.rss", "Resident Memory", units::BYTES, "Resident set size of the process."),
        &[],
        move || p.sample().rss,
    )?;

    let p = Arc::clone(&probe);
    registry.gauge(
        gauge(
            "memory.virtual",
            "Virtual Memory",
            units::BYTES,
            "Virtual memory size of the process.",
        ),
        &[],
        move || p.sample().virtual_memory,
    )?;

    registry.gauge(
        gauge(
            "cpu.availableProcessors",
            "Available Processors",
            units::NONE,
            "Number of processors available to the process.",
        ),
        &[],
        || std::thread::available_parallelism().map_or(1, usize::from) as u64,
    )?;

    let p = Arc::clone(&probe);
    registry.gauge(
        gauge(
            "process.uptime",
            "Uptime",
            units::MILLISECONDS,
            "Time since the metrics subsystem started.",
        ),
        &[],
        move || p.uptime_millis(),
    )?;

    registry.gauge(
        gauge(
            "cpu.processCpuLoad",
            "Process CPU Load",
            units::PERCENT,
            "CPU usage of the process since the previous read.",
        ),
        &[],
        move || probe.sample().cpu_percent,
    )?;

    Ok(())
}
