//! Error types shared across the Movie Shelf crates

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShelfError {
    /// A configuration value is missing, unparsable or out of range
    #[error("Configuration error: {message}")]
    ConfigurationError {
        message: String,
        key: Option<String>,
    },

    /// The tracing subscriber could not be installed
    #[error("Telemetry error: {0}")]
    TelemetryError(String),
}

impl ShelfError {
    /// Build a configuration error tied to a specific environment key
    pub fn config_key(message: impl Into<String>, key: &str) -> Self {
        Self::ConfigurationError {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// Environment key that caused the error, if any
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::ConfigurationError { key, .. } => key.as_deref(),
            Self::TelemetryError(_) => None,
        }
    }
}
