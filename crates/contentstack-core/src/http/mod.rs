//! HTTP layer for content API communication
//!
//! This module provides:
//! - Query-string serialization in bracket and compact form
//! - A transport abstraction with a reqwest implementation
//! - Rate-limit aware retry decisions
//! - Error normalization into a single stable shape
//! - Request dispatch with live preview and URL length management

pub mod client;
pub mod error;
pub mod rate_limit;
pub mod request;
pub mod retry;
pub mod serializer;
pub mod transport;


pub use client::HttpClient;
pub use error::{ApiError, ErrorCode, ErrorKind, RequestSummary};
pub use rate_limit::{calculate_rate_limit_delay, RateLimitHeaders};
pub use request::{get_data, RequestOptions, LIVE_PREVIEW_MAX_URL_LENGTH, MAX_URL_LENGTH};
pub use retry::{RequestContext, RetryDecision, RetryPolicy};
pub use serializer::{serialize, ArrayFormat, Params};
pub use transport::{
    FailedAttempt, PreparedRequest, ReqwestTransport, Transport, TransportError,
    TransportResponse,
};

// Re-export commonly used types
pub use reqwest::{Method, StatusCode};
