//! Push reporters: each tick they snapshot the enabled registries and ship
//! the result to Graphite, a line-delimited JSON socket, or the log.
//!
//! Socket failures drop the connection and back off; the next tick
//! reconnects. Reporters never stop on their own.

pub mod backoff;
pub mod error;
pub mod graphite;
pub mod logs;
pub mod logstash;
pub mod scheduler;
pub mod sink;

pub use {
    backoff::Backoff,
    error::{Error, Result},
    graphite::GraphiteReporter,
    logs::LogsReporter,
    logstash::LogstashReporter,
    scheduler::{Report, ReportSource, ReporterHandle, Schedule, spawn},
    sink::TcpSink,
};
