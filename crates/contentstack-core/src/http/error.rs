//! Error normalization for content API requests
//!
//! Every failure on the dispatch path (transport errors, non-2xx responses,
//! invalid live-preview settings, oversized URLs, empty payloads) converges
//! on [`ApiError`], whose serialized form is the stable shape consumers parse:
//! `{error_message, error_code, status, statusText?, errors?}`.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::transport::{TransportError, TransportResponse};

/// Code used for connection-level failures that carry no code of their own
pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
/// Code and message used when nothing about a failure is recognizable
pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";
/// Message used when an error response body names no message at all
pub const REQUEST_FAILED: &str = "Request failed";
/// Code reported for client-side request timeouts
pub const TIMEOUT_CODE: i64 = 408;

/// Where a failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Invalid client or live-preview settings, raised before any network call
    Configuration,
    /// The request URL exceeds the length limit even in compact form
    UrlTooLong,
    /// Non-2xx response that was not retryable or exhausted its retries
    Http,
    /// The request timed out
    Timeout,
    /// Connection-level failure without a response
    Network,
    /// A 2xx response without a payload
    MalformedResponse,
    /// Anything else
    #[default]
    Unknown,
}

impl ErrorKind {
    fn default_code(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "CONFIGURATION_ERROR",
            ErrorKind::UrlTooLong => "URL_TOO_LONG",
            ErrorKind::MalformedResponse => "MALFORMED_RESPONSE",
            ErrorKind::Network | ErrorKind::Timeout => NETWORK_ERROR,
            ErrorKind::Http | ErrorKind::Unknown => UNKNOWN_ERROR,
        }
    }
}

/// API error codes are numeric for HTTP failures and symbolic otherwise
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorCode {
    Number(i64),
    Text(String),
}

impl ErrorCode {
    /// Interpret a JSON value from a response body as an error code
    fn from_json(value: &Value) -> Self {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map(ErrorCode::Number)
                .unwrap_or_else(|| ErrorCode::Text(n.to_string())),
            Value::String(s) => ErrorCode::Text(s.clone()),
            other => ErrorCode::Text(other.to_string()),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Number(n) => write!(f, "{}", n),
            ErrorCode::Text(s) => f.write_str(s),
        }
    }
}

impl From<u16> for ErrorCode {
    fn from(status: u16) -> Self {
        ErrorCode::Number(i64::from(status))
    }
}

impl From<&str> for ErrorCode {
    fn from(code: &str) -> Self {
        ErrorCode::Text(code.to_string())
    }
}

/// The request an error belongs to, with credentials masked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSummary {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
}

/// Normalized error returned for every failed request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{error_message}")]
pub struct ApiError {
    /// Failure origin; not part of the wire shape
    #[serde(skip)]
    pub kind: ErrorKind,
    pub error_message: String,
    pub error_code: ErrorCode,
    /// HTTP status, or 0 when no response was received
    pub status: u16,
    #[serde(rename = "statusText", default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    /// Field-level details from the response body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestSummary>,
}

impl ApiError {
    pub fn new(
        kind: ErrorKind,
        message: impl Into<String>,
        error_code: ErrorCode,
        status: u16,
    ) -> Self {
        Self {
            kind,
            error_message: message.into(),
            error_code,
            status,
            status_text: None,
            errors: None,
            request: None,
        }
    }

    /// Failure raised locally, before any network call
    fn local(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, ErrorCode::from(kind.default_code()), 0)
    }

    /// Live preview redirection was requested without a host
    pub fn host_required() -> Self {
        Self::local(ErrorKind::Configuration, "Host is required for live preview")
    }

    /// A live preview value cannot be sent as a header
    pub fn invalid_header(name: &str) -> Self {
        Self::local(
            ErrorKind::Configuration,
            format!("Invalid value for header '{}'", name),
        )
    }

    /// The assembled URL is longer than the active threshold even when compact
    pub fn url_too_long(length: usize, max_length: usize) -> Self {
        Self::local(
            ErrorKind::UrlTooLong,
            format!(
                "Request URL length ({} characters) exceeds the maximum allowed length ({} characters)",
                length, max_length
            ),
        )
    }

    /// A 2xx response that carried no payload
    pub fn malformed_response(status: u16) -> Self {
        let mut error = Self::local(
            ErrorKind::MalformedResponse,
            format!("Response with status {} carried no data", status),
        );
        error.status = status;
        error
    }

    /// Synthesized error for a request that hit the client timeout
    pub fn timeout(timeout: Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("Timeout of {}ms exceeded", timeout.as_millis()),
            ErrorCode::Number(TIMEOUT_CODE),
            0,
        )
    }

    /// Normalize a non-2xx response
    pub fn from_response(response: &TransportResponse) -> Self {
        let status = response.status.as_u16();
        let body = response.body.as_ref();
        let mut error = Self::new(
            ErrorKind::Http,
            extract_error_message(body),
            extract_error_code(body, status),
            status,
        );
        error.status_text = response.status.canonical_reason().map(str::to_string);
        error.errors = body
            .and_then(|b| b.get("errors"))
            .filter(|e| !e.is_null())
            .cloned();
        error
    }

    /// Normalize a failure that produced no response
    pub fn from_transport(error: &TransportError) -> Self {
        let message = error.message();
        if message.is_empty() {
            return Self::new(
                ErrorKind::Unknown,
                UNKNOWN_ERROR,
                ErrorCode::from(UNKNOWN_ERROR),
                0,
            );
        }
        let code = error
            .code()
            .map(ErrorCode::from)
            .unwrap_or_else(|| ErrorCode::from(NETWORK_ERROR));
        Self::new(ErrorKind::Network, message, code, 0)
    }

    /// Attach the request this error belongs to
    pub fn with_request(mut self, request: RequestSummary) -> Self {
        self.request = Some(request);
        self
    }
}

/// JavaScript-style truthiness, which is what content API bodies are written against
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn field<'a>(body: &'a Value, key: &str) -> Option<&'a Value> {
    body.get(key).filter(|v| is_truthy(v))
}

/// `error_message` → `message` → `error` → plain-string body → generic
fn extract_error_message(body: Option<&Value>) -> String {
    let Some(body) = body else {
        return REQUEST_FAILED.to_string();
    };
    for key in ["error_message", "message", "error"] {
        match field(body, key) {
            Some(Value::String(s)) => return s.clone(),
            Some(other) => return other.to_string(),
            None => {}
        }
    }
    match body {
        Value::String(s) if !s.is_empty() => s.clone(),
        _ => REQUEST_FAILED.to_string(),
    }
}

/// `error_code` → `code` → HTTP status
fn extract_error_code(body: Option<&Value>, status: u16) -> ErrorCode {
    body.and_then(|b| field(b, "error_code").or_else(|| field(b, "code")))
        .map(ErrorCode::from_json)
        .unwrap_or_else(|| ErrorCode::from(status))
}
