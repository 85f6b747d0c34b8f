use thiserror::Error;

/// Everything that can go wrong while storing a notification event.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Insert rejected: {0}")]
    InsertRejected(String),
}

impl IngestError {
    /// Stable name of the error kind, for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::MalformedPayload(_) => "MalformedPayload",
            IngestError::ConfigurationMissing(_) => "ConfigurationMissing",
            IngestError::BackendUnavailable(_) => "BackendUnavailable",
            IngestError::InsertRejected(_) => "InsertRejected",
        }
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(e: serde_json::Error) -> Self {
        IngestError::MalformedPayload(e.to_string())
    }
}
