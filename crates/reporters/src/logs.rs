//! Emits the payload through `tracing` instead of a socket.

use {
    async_trait::async_trait,
    tally_metrics::MetricsPayload,
    tracing::{Level, debug, error, info, trace, warn},
};

use crate::{
    error::{Error, Result},
    scheduler::Report,
};

#[derive(Debug, Clone)]
pub struct LogsReporter {
    level: Level,
}

impl LogsReporter {
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Parse a level name such as `debug` or `WARN`.
    pub fn from_level_name(name: &str) -> Result<Self> {
        let level = name
            .parse::<Level>()
            .map_err(|_| Error::message(format!("unknown log level: {name}")))?;
        Ok(Self::new(level))
    }

    pub fn level(&self) -> Level {
        self.level
    }
}

#[async_trait]
impl Report for LogsReporter {
    fn name(&self) -> &'static str {
        "logs"
    }

    async fn report(&mut self, payload: &MetricsPayload) -> Result<()> {
        let metrics = payload.to_json()?;
        match self.level {
            Level::TRACE => trace!(target: "tally::metrics", %metrics, "metrics report"),
            Level::DEBUG => debug!(target: "tally::metrics", %metrics, "metrics report"),
            Level::INFO => info!(target: "tally::metrics", %metrics, "metrics report"),
            Level::WARN => warn!(target: "tally::metrics", %metrics, "metrics report"),
            _ => error!(target: "tally::metrics", %metrics, "metrics report"),
        }
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("debug", Level::DEBUG)]
    #[case("WARN", Level::WARN)]
    #[case("info", Level::INFO)]
    fn parses_level_names(#[case] name: &str, #[case] level: Level) {
        assert_eq!(LogsReporter::from_level_name(name).unwrap().level(), level);
    }

    #[test]
    fn rejects_unknown_levels() {
        assert!(LogsReporter::from_level_name("loud").is_err());
    }
}
