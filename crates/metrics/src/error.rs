use crate::{id::MetricId, metadata::MetricType};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("metric {id} already exists and is not compatible with the registered metric")]
    DuplicateMetric { id: MetricId },

    #[error("metric {id} is already registered as a {existing}, not a {requested}")]
    TypeConflict {
        id: MetricId,
        existing: MetricType,
        requested: MetricType,
    },

    #[error("metric {id} is not registered")]
    UnknownMetric { id: MetricId },

    #[error("malformed tag: {raw}")]
    MalformedTag { raw: String },

    #[error("{context}: {source}")]
    Export {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn duplicate(id: MetricId) -> Self {
        Self::DuplicateMetric { id }
    }

    #[must_use]
    pub fn unknown(id: MetricId) -> Self {
        Self::UnknownMetric { id }
    }

    #[must_use]
    pub fn malformed_tag(raw: impl Into<String>) -> Self {
        Self::MalformedTag { raw: raw.into() }
    }

    #[must_use]
    pub fn export<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Export {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
