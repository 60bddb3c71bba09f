use thiserror::Error;

/// Application-wide error types for quakefeed.
#[derive(Error, Debug)]
pub enum AppError {
    /// The message source could not capture or scroll the page.
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// A bounded wait expired.
    #[error("Timed out after {0} seconds")]
    Timeout(u64),

    /// Writing records to the sink failed.
    #[error("Sink error: {0}")]
    SinkError(String),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if this error ends a pipeline run.
    ///
    /// Only adapter-level failures escalate; a timeout while waiting for
    /// the page to settle is read as "no further content".
    pub fn is_fatal(&self) -> bool {
        !matches!(self, AppError::Timeout(_))
    }
}
