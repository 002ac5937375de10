//! # Error Types
//!
//! Library errors for configuration and wiring, plus the transport error
//! taxonomy that the prober converts into status values.

use thiserror::Error;

/// Monitor operation result type
pub type MonitorResult<T> = Result<T, MonitorError>;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid URL for {field}: {value}")]
    InvalidUrl { field: String, value: String },

    #[error("Duplicate service name: {0}")]
    DuplicateService(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl MonitorError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn invalid_url(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidUrl {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl From<config::ConfigError> for MonitorError {
    fn from(error: config::ConfigError) -> Self {
        MonitorError::configuration(error.to_string())
    }
}

/// Failure to complete a probe request at the transport level
///
/// These never leave the prober: they become `ServiceState::Unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }
}
