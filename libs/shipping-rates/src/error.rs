//! Shipping rate error types

use std::sync::Arc;
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, RateError>;

/// Marker the Sheets API puts in 400 responses for a bad A1 range
pub const RANGE_PARSE_MARKER: &str = "Unable to parse range";

/// Remote table source errors
///
/// `RangeParse` is kept apart from other API failures because it is the one
/// class the range resolver can recover from. Errors are `Clone` so a failed
/// load can be handed to every caller that waited on it.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("Unable to parse range {range}: {message}")]
    RangeParse { range: String, message: String },

    #[error("Sheets API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP client error: {0}")]
    Http(#[source] Arc<reqwest::Error>),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl SourceError {
    /// Classify a non-success API response
    pub fn from_api_response(range: Option<&str>, status: u16, message: String) -> Self {
        match range {
            Some(range) if status == 400 && message.contains(RANGE_PARSE_MARKER) => {
                Self::RangeParse {
                    range: range.to_string(),
                    message,
                }
            },
            _ => Self::Api { status, message },
        }
    }

    pub fn is_range_parse(&self) -> bool {
        matches!(self, Self::RangeParse { .. })
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(Arc::new(err))
    }
}

/// Engine errors
#[derive(Debug, Clone, Error)]
pub enum RateError {
    #[error("Rate source error: {0}")]
    Source(#[from] SourceError),

    #[error("Unsupported shipping method '{method}', supported: {}", supported.join(", "))]
    UnsupportedMethod {
        method: String,
        supported: Vec<String>,
    },
}

impl RateError {
    /// HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::UnsupportedMethod { .. } => 400,
            Self::Source(_) => 500,
        }
    }

    /// Caller mistakes, as opposed to server-side failures
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }

    /// Configuration problems are not worth retrying
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Source(SourceError::Configuration(_)))
    }
}
