//! Client configuration
//!
//! [`ClientConfig`] holds the caller's options exactly as given. It can be
//! built in code, parsed from JSON (camelCase keys, matching the options
//! documented for the delivery SDKs) and overlaid with environment
//! variables. [`ClientSettings`] is the result of merging those options over
//! the defaults; it is what the client actually runs with.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::http::{ApiError, FailedAttempt};
use crate::logging::{default_log_handler, LogLevel};

/// Decides whether a failed attempt should be re-issued
pub type RetryCondition = Arc<dyn Fn(&FailedAttempt) -> bool + Send + Sync>;
/// Observes the final error of a failed request
pub type ErrorHook = Arc<dyn Fn(&ApiError) + Send + Sync>;
/// Receives log lines from the client
pub type LogHandler = Arc<dyn Fn(LogLevel, &str) + Send + Sync>;

pub const DEFAULT_HOSTNAME: &str = "cdn.contentstack.io";
pub const DEFAULT_PORT: u16 = 443;
pub const DEFAULT_VERSION: &str = "v3";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);
pub const DEFAULT_RETRY_LIMIT: u32 = 5;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(300);

/// Header carrying the stack API key
pub const API_KEY_HEADER: &str = "api_key";
/// Header carrying the delivery access token
pub const ACCESS_TOKEN_HEADER: &str = "access_token";

/// Options for constructing an [`HttpClient`](crate::http::HttpClient)
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// API host, preferred over `default_hostname`
    pub host: Option<String>,
    /// Full base URL; overrides protocol, host, port, base path and version
    pub endpoint: Option<String>,
    /// Use plain `http`
    pub insecure: Option<bool>,
    pub port: Option<u16>,
    /// API version path segment
    pub version: Option<String>,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    /// Additional default headers
    pub headers: BTreeMap<String, String>,
    /// Path inserted between the port and the version
    pub base_path: Option<String>,
    /// Request timeout in milliseconds
    pub timeout: Option<u64>,
    /// Whether failed requests may be retried at all
    pub retry_on_error: Option<bool>,
    /// Maximum number of requests per call, the first one included
    pub retry_limit: Option<u32>,
    /// Delay in milliseconds before re-issuing on a custom retry condition
    pub retry_delay: Option<u64>,
    /// Host used when `host` is not given
    pub default_hostname: Option<String>,

    #[serde(skip)]
    pub retry_condition: Option<RetryCondition>,
    #[serde(skip)]
    pub on_error: Option<ErrorHook>,
    #[serde(skip)]
    pub log_handler: Option<LogHandler>,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host", &self.host)
            .field("endpoint", &self.endpoint)
            .field("insecure", &self.insecure)
            .field("port", &self.port)
            .field("version", &self.version)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("base_path", &self.base_path)
            .field("timeout", &self.timeout)
            .field("retry_on_error", &self.retry_on_error)
            .field("retry_limit", &self.retry_limit)
            .field("retry_delay", &self.retry_delay)
            .field("default_hostname", &self.default_hostname)
            .field("retry_condition", &self.retry_condition.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("log_handler", &self.log_handler.is_some())
            .finish()
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_default_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.default_hostname = Some(hostname.into());
        self
    }

    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = Some(insecure);
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = Some(access_token.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_retry_on_error(mut self, retry_on_error: bool) -> Self {
        self.retry_on_error = Some(retry_on_error);
        self
    }

    pub fn with_retry_limit(mut self, retry_limit: u32) -> Self {
        self.retry_limit = Some(retry_limit);
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = Some(retry_delay.as_millis() as u64);
        self
    }

    pub fn with_retry_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&FailedAttempt) -> bool + Send + Sync + 'static,
    {
        self.retry_condition = Some(Arc::new(condition));
        self
    }

    pub fn with_on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ApiError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    pub fn with_log_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(LogLevel, &str) + Send + Sync + 'static,
    {
        self.log_handler = Some(Arc::new(handler));
        self
    }

    /// Overlay options found in the environment
    pub fn merge_with_env(&mut self) {
        if let Ok(api_key) = std::env::var("CONTENTSTACK_API_KEY") {
            self.api_key = Some(api_key);
        }
        if let Ok(token) = std::env::var("CONTENTSTACK_ACCESS_TOKEN") {
            self.access_token = Some(token);
        }
        if let Ok(host) = std::env::var("CONTENTSTACK_HOST") {
            self.host = Some(host);
        }
        if let Ok(endpoint) = std::env::var("CONTENTSTACK_ENDPOINT") {
            self.endpoint = Some(endpoint);
        }
    }

    /// Validate option values that cannot be checked by the type system
    pub fn validate(&self) -> Result<()> {
        if self.timeout == Some(0) {
            return Err(Error::configuration("timeout must be greater than zero"));
        }
        if self.port == Some(0) {
            return Err(Error::configuration("port must be greater than zero"));
        }
        if let Some(endpoint) = &self.endpoint {
            url::Url::parse(endpoint).map_err(|e| Error::Configuration {
                message: format!("Invalid endpoint: {}", endpoint),
                source: Some(anyhow::Error::from(e)),
            })?;
        }
        Ok(())
    }
}

/// Live preview settings supplied by the delivery SDK
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivePreviewConfig {
    pub enable: bool,
    /// `"init"` or the hash of the entry being previewed
    pub live_preview: Option<String>,
    pub preview_token: Option<String>,
    /// Preview host; `https://` is assumed when no scheme is given
    pub host: Option<String>,
}

impl LivePreviewConfig {
    pub const INIT: &'static str = "init";

    /// The hash to send, defaulting to `"init"`
    pub fn hash(&self) -> &str {
        self.live_preview
            .as_deref()
            .filter(|h| !h.is_empty())
            .unwrap_or(Self::INIT)
    }

    /// Requests must go to the preview host instead of the delivery host
    pub fn requires_redirect(&self) -> bool {
        self.enable
            && self
                .live_preview
                .as_deref()
                .map(|h| !h.is_empty() && h != Self::INIT)
                .unwrap_or(false)
    }
}

/// Stack-level settings a delivery SDK attaches to the client after construction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    pub live_preview: Option<LivePreviewConfig>,
}

/// Options merged over the defaults
#[derive(Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub headers: HeaderMap,
    pub timeout: Duration,
    pub retry_on_error: bool,
    pub retry_limit: u32,
    pub retry_delay: Duration,
    pub retry_condition: RetryCondition,
    pub log_handler: LogHandler,
    pub on_error: Option<ErrorHook>,
}

impl fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSettings")
            .field("base_url", &self.base_url)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .field("retry_on_error", &self.retry_on_error)
            .field("retry_limit", &self.retry_limit)
            .field("retry_delay", &self.retry_delay)
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl ClientSettings {
    /// Merge caller options over the defaults
    pub fn resolve(options: &ClientConfig) -> Result<Self> {
        options.validate()?;

        Ok(Self {
            base_url: base_url(options),
            headers: default_headers(options)?,
            timeout: options
                .timeout
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_TIMEOUT),
            retry_on_error: options.retry_on_error.unwrap_or(true),
            retry_limit: options.retry_limit.unwrap_or(DEFAULT_RETRY_LIMIT),
            retry_delay: options
                .retry_delay
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_RETRY_DELAY),
            retry_condition: options
                .retry_condition
                .clone()
                .unwrap_or_else(default_retry_condition),
            log_handler: options
                .log_handler
                .clone()
                .unwrap_or_else(|| Arc::new(default_log_handler) as LogHandler),
            on_error: options.on_error.clone(),
        })
    }
}

/// Retry only when the server reports too many requests
pub fn default_retry_condition() -> RetryCondition {
    Arc::new(|attempt: &FailedAttempt| attempt.status() == Some(429))
}

/// `endpoint`, or `{protocol}://{hostname}:{port}{basePath}/{version}`
fn base_url(options: &ClientConfig) -> String {
    if let Some(endpoint) = options.endpoint.as_deref().filter(|e| !e.is_empty()) {
        return endpoint.to_string();
    }
    let protocol = if options.insecure.unwrap_or(false) {
        "http"
    } else {
        "https"
    };
    let hostname = options
        .host
        .as_deref()
        .or(options.default_hostname.as_deref())
        .filter(|h| !h.is_empty())
        .unwrap_or(DEFAULT_HOSTNAME);
    let port = options.port.unwrap_or(DEFAULT_PORT);
    let base_path = options.base_path.as_deref().unwrap_or("");
    let version = options
        .version
        .as_deref()
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_VERSION);

    format!(
        "{}://{}:{}{}/{}",
        protocol, hostname, port, base_path, version
    )
}

fn default_headers(options: &ClientConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in &options.headers {
        insert_header(&mut headers, name, value)?;
    }
    if let Some(api_key) = options.api_key.as_deref().filter(|k| !k.is_empty()) {
        insert_header(&mut headers, API_KEY_HEADER, api_key)?;
    }
    if let Some(token) = options.access_token.as_deref().filter(|t| !t.is_empty()) {
        insert_header(&mut headers, ACCESS_TOKEN_HEADER, token)?;
    }
    Ok(headers)
}

/// Insert a header, rejecting names or values that are not valid HTTP
pub fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<()> {
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::InvalidHeader {
        name: name.to_string(),
        message: e.to_string(),
    })?;
    let header_value = HeaderValue::from_str(value).map_err(|e| Error::InvalidHeader {
        name: name.to_string(),
        message: e.to_string(),
    })?;
    headers.insert(header_name, header_value);
    Ok(())
}
