//! Transport abstraction between the dispatcher and the HTTP library
//!
//! The core only needs one capability from an HTTP library: send a GET
//! described by a [`PreparedRequest`] and hand back status, headers and the
//! decoded body. [`ReqwestTransport`] is the default implementation; tests and
//! embedders can supply their own.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde_json::Value;

use crate::http::serializer::{self, ArrayFormat, Params};

/// A fully resolved request, re-sent unchanged on every retry
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    /// Absolute target URL, without the parameters in `query`
    pub url: String,
    /// Parameters the transport still has to encode. `None` means `url` is final.
    pub query: Option<Params>,
    pub headers: HeaderMap,
    pub timeout: Duration,
}

impl PreparedRequest {
    /// Standard form: the transport appends bracket-encoded parameters
    pub fn standard(url: impl Into<String>, params: Params, headers: HeaderMap, timeout: Duration) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            query: Some(params),
            headers,
            timeout,
        }
    }

    /// Assembled form: the URL already carries its query string
    pub fn assembled(url: impl Into<String>, headers: HeaderMap, timeout: Duration) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            query: None,
            headers,
            timeout,
        }
    }

    /// The URL that goes on the wire
    pub fn full_url(&self) -> String {
        match &self.query {
            Some(params) => append_query(&self.url, &serializer::serialize(params, ArrayFormat::Brackets)),
            None => self.url.clone(),
        }
    }
}

/// Join a URL and an encoded query string
pub fn append_query(url: &str, query: &str) -> String {
    if query.is_empty() {
        return url.to_string();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", url, separator, query)
}

/// What came back from the server, regardless of status
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Decoded JSON body; non-JSON text becomes a JSON string, empty bodies are `None`
    pub body: Option<Value>,
}

impl TransportResponse {
    pub fn new(status: StatusCode, body: Option<Value>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body,
        }
    }

    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = value.parse::<reqwest::header::HeaderValue>() {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Failure before any response was received
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The connection was aborted by the client timeout
    #[error("request timed out: {message}")]
    Timeout { message: String },

    /// The connection could not be established
    #[error("connection failed: {message}")]
    Connect { message: String, code: Option<String> },

    #[error("{message}")]
    Other { message: String, code: Option<String> },
}

impl TransportError {
    pub fn message(&self) -> &str {
        match self {
            TransportError::Timeout { message }
            | TransportError::Connect { message, .. }
            | TransportError::Other { message, .. } => message,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            TransportError::Timeout { .. } => Some("ECONNABORTED"),
            TransportError::Connect { code, .. } | TransportError::Other { code, .. } => {
                code.as_deref()
            }
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        let message = error.to_string();
        if error.is_timeout() {
            TransportError::Timeout { message }
        } else if error.is_connect() {
            TransportError::Connect { message, code: None }
        } else if error.is_builder() {
            TransportError::Other {
                message,
                code: Some("ERR_INVALID_URL".to_string()),
            }
        } else {
            TransportError::Other { message, code: None }
        }
    }
}

/// One unsuccessful attempt, as seen by the retry policy
#[derive(Debug, Clone)]
pub enum FailedAttempt {
    /// No response was received
    Transport(TransportError),
    /// A response with a non-2xx status
    Response(TransportResponse),
}

impl FailedAttempt {
    pub fn response(&self) -> Option<&TransportResponse> {
        match self {
            FailedAttempt::Response(response) => Some(response),
            FailedAttempt::Transport(_) => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.response().map(|r| r.status.as_u16())
    }
}

/// The capability the core needs from an HTTP library
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request. Non-2xx statuses are returned as responses, not errors.
    async fn send(&self, request: &PreparedRequest) -> Result<TransportResponse, TransportError>;
}

/// Default transport backed by reqwest
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &PreparedRequest) -> Result<TransportResponse, TransportError> {
        let url = request.full_url();
        let response = self
            .client
            .request(request.method.clone(), url.as_str())
            .headers(request.headers.clone())
            .timeout(request.timeout)
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.bytes().await?;

        Ok(TransportResponse {
            status,
            headers,
            body: decode_body(&bytes),
        })
    }
}

fn decode_body(bytes: &[u8]) -> Option<Value> {
    if bytes.is_empty() {
        return None;
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value) => Some(value),
        Err(_) => Some(Value::String(String::from_utf8_lossy(bytes).into_owned())),
    }
}
