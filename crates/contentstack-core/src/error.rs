//! Error types for the Contentstack core library
//!
//! Construction and configuration failures surface as [`Error`]. Everything
//! that goes wrong while dispatching a request is normalized into a single
//! [`ApiError`](crate::http::ApiError) instead, which [`Error::Api`] wraps
//! when the two need to meet.

use thiserror::Error;

use crate::http::ApiError;

/// Main error type for client construction and configuration
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or inconsistent client options
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// The underlying reqwest client could not be built
    #[error("HTTP client error: {message}")]
    HttpClient {
        message: String,
        #[source]
        source: reqwest::Error,
    },

    /// A configured header name or value is not valid HTTP
    #[error("Invalid header '{name}': {message}")]
    InvalidHeader { name: String, message: String },

    /// Options could not be parsed
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// A request failed after dispatch
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error without an underlying cause
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
            source: err,
        }
    }
}
