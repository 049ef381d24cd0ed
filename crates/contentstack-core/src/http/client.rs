//! Content API client
//!
//! Owns the resolved settings, the transport and the retry policy, and runs
//! the bounded retry loop every dispatched request goes through.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::header::HeaderMap;
use serde_json::Value;

use crate::config::{ClientConfig, ClientSettings, StackConfig};
use crate::error::{Error, Result};
use crate::http::error::{ApiError, RequestSummary};
use crate::http::request::{self, RequestOptions};
use crate::http::retry::{RequestContext, RetryDecision, RetryPolicy};
use crate::http::transport::{
    FailedAttempt, PreparedRequest, ReqwestTransport, Transport, TransportResponse,
};
use crate::logging::redaction::redact_headers;
use crate::logging::LogLevel;

/// Client for the content delivery API
pub struct HttpClient {
    transport: Arc<dyn Transport>,
    settings: ClientSettings,
    retry_policy: RetryPolicy,
    /// Options exactly as the caller passed them
    http_client_params: ClientConfig,
    stack_config: RwLock<Option<StackConfig>>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("settings", &self.settings)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Create a client backed by reqwest
    pub fn new(options: &ClientConfig) -> Result<Self> {
        let settings = ClientSettings::resolve(options)?;
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| Error::HttpClient {
                message: format!("Failed to create HTTP client: {}", e),
                source: e,
            })?;

        Ok(Self::from_parts(
            options.clone(),
            settings,
            Arc::new(ReqwestTransport::new(client)),
        ))
    }

    /// Create a client that sends through the given transport
    pub fn with_transport(options: &ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let settings = ClientSettings::resolve(options)?;
        Ok(Self::from_parts(options.clone(), settings, transport))
    }

    fn from_parts(
        http_client_params: ClientConfig,
        settings: ClientSettings,
        transport: Arc<dyn Transport>,
    ) -> Self {
        tracing::debug!(base_url = %settings.base_url, "content API client created");
        Self {
            transport,
            retry_policy: RetryPolicy::from(&settings),
            settings,
            http_client_params,
            stack_config: RwLock::new(None),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.settings.base_url
    }

    pub fn default_headers(&self) -> &HeaderMap {
        &self.settings.headers
    }

    pub fn timeout(&self) -> Duration {
        self.settings.timeout
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// The options this client was created from, before defaults were applied
    pub fn http_client_params(&self) -> &ClientConfig {
        &self.http_client_params
    }

    /// Attach stack-level settings, read by every subsequent request
    pub fn set_stack_config(&self, stack_config: StackConfig) {
        let mut guard = self
            .stack_config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(stack_config);
    }

    pub fn stack_config(&self) -> Option<StackConfig> {
        self.stack_config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Fetch a JSON document; see [`request::get_data`]
    pub async fn get_data(
        &self,
        url: &str,
        options: impl Into<RequestOptions>,
    ) -> std::result::Result<Value, ApiError> {
        request::get_data(self, url, options).await
    }

    /// Send a request, re-issuing it for as long as the retry policy allows.
    ///
    /// Returns the first 2xx response. Every other outcome ends in one
    /// normalized error, which is also handed to the log handler and the
    /// `on_error` hook.
    pub async fn execute(
        &self,
        request: PreparedRequest,
    ) -> std::result::Result<TransportResponse, ApiError> {
        let mut ctx = RequestContext::new();
        loop {
            let failure = match self.transport.send(&request).await {
                Ok(response) if response.is_success() => return Ok(response),
                Ok(response) => FailedAttempt::Response(response),
                Err(error) => FailedAttempt::Transport(error),
            };

            match self.retry_policy.decide(&failure, &mut ctx) {
                RetryDecision::Retry { delay } => {
                    tracing::warn!(
                        url = %request.url,
                        status = ?failure.status(),
                        retry_count = ctx.retry_count,
                        delay_ms = delay.as_millis() as u64,
                        "request failed, retrying"
                    );
                    (self.settings.log_handler)(
                        LogLevel::Warning,
                        &format!(
                            "Request failed, retrying in {}ms (attempt {} of {})",
                            delay.as_millis(),
                            ctx.retry_count,
                            self.retry_policy.retry_limit
                        ),
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::Fail(error) => {
                    let error = error.with_request(summarize(&request));
                    return Err(self.report(error));
                }
            }
        }
    }

    fn report(&self, error: ApiError) -> ApiError {
        tracing::error!(
            status = error.status,
            error_code = %error.error_code,
            "request failed: {}",
            error.error_message
        );
        (self.settings.log_handler)(LogLevel::Error, &error.error_message);
        if let Some(on_error) = &self.settings.on_error {
            on_error(&error);
        }
        error
    }
}

fn summarize(request: &PreparedRequest) -> RequestSummary {
    RequestSummary {
        method: request.method.to_string(),
        url: request.full_url(),
        headers: redact_headers(&request.headers),
    }
}
