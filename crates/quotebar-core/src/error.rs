//! Error types for the quote bar.

use std::time::Duration;
use thiserror::Error;

/// Top-level error.
#[derive(Error, Debug)]
pub enum QuotebarError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration errors.
///
/// Fatal at startup. A reload that fails with one of these leaves the
/// running configuration untouched.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Invalid {field}: {value} (must be greater than zero)")]
    InvalidInterval { field: &'static str, value: String },

    #[error("Invalid fetch key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Invalid display format: {0}")]
    InvalidTemplate(String),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-fetch errors.
///
/// Always recoverable: the scheduler turns them into a backoff transition
/// and a log event, they never reach the display.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Instrument not found: {0}")]
    NotFound(String),
}

impl FetchError {
    /// Short label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "network",
            FetchError::Timeout(_) => "timeout",
            FetchError::Parse(_) => "parse",
            FetchError::NotFound(_) => "not_found",
        }
    }
}

/// Result type alias for quote bar operations.
pub type QuotebarResult<T> = Result<T, QuotebarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_kind() {
        assert_eq!(FetchError::Timeout(Duration::from_secs(5)).kind(), "timeout");
        assert_eq!(FetchError::NotFound("X".into()).kind(), "not_found");
    }

    #[test]
    fn test_config_error_converts() {
        let err: QuotebarError = ConfigError::UnknownProvider("crypto".into()).into();
        assert_eq!(
            err.to_string(),
            "Configuration error: Unknown provider: crypto"
        );
    }
}
