//! Line-delimited JSON over TCP.

use {async_trait::async_trait, tally_metrics::MetricsPayload};

use crate::{error::Result, scheduler::Report, sink::TcpSink};

/// Writes one payload document plus `\n` per tick.
#[derive(Debug)]
pub struct LogstashReporter {
    sink: TcpSink,
}

impl LogstashReporter {
    #[must_use]
    pub fn new(sink: TcpSink) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Report for LogstashReporter {
    fn name(&self) -> &'static str {
        "logstash"
    }

    async fn report(&mut self, payload: &MetricsPayload) -> Result<()> {
        let mut line = payload.to_json()?;
        line.push('\n');
        self.sink.send(line.as_bytes()).await
    }

    async fn close(&mut self) {
        self.sink.close().await;
    }
}
