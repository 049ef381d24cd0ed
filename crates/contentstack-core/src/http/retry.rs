//! Retry decisions for failed content API requests
//!
//! Unlike a generic exponential backoff, the delivery API tells the client
//! how long to wait: rate-limited responses carry replenishment headers and
//! the policy follows them. Other failures are only retried when the
//! configured retry condition accepts them, after a fixed delay.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::{ClientSettings, RetryCondition};
use crate::http::error::ApiError;
use crate::http::rate_limit::RateLimitHeaders;
use crate::http::transport::FailedAttempt;

/// Per-request retry bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Retries counted so far, including one refused by the limit
    pub retry_count: u32,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Decision on a failed attempt
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Re-issue the same request after the delay
    Retry { delay: Duration },
    /// Give up with this error
    Fail(ApiError),
}

/// Retry settings for one client
#[derive(Clone)]
pub struct RetryPolicy {
    pub retry_on_error: bool,
    pub retry_limit: u32,
    /// Delay used when the retry condition, not rate limiting, triggers a retry
    pub retry_delay: Duration,
    /// Client timeout, reported in timeout errors
    pub timeout: Duration,
    pub retry_condition: RetryCondition,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("retry_on_error", &self.retry_on_error)
            .field("retry_limit", &self.retry_limit)
            .field("retry_delay", &self.retry_delay)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl From<&ClientSettings> for RetryPolicy {
    fn from(settings: &ClientSettings) -> Self {
        Self {
            retry_on_error: settings.retry_on_error,
            retry_limit: settings.retry_limit,
            retry_delay: settings.retry_delay,
            timeout: settings.timeout,
            retry_condition: settings.retry_condition.clone(),
        }
    }
}

impl RetryPolicy {
    /// Decide what to do with a failed attempt, counting the retry in `ctx`
    pub fn decide(&self, failure: &FailedAttempt, ctx: &mut RequestContext) -> RetryDecision {
        self.decide_at(failure, ctx, Utc::now())
    }

    /// [`decide`](Self::decide) against a fixed clock
    pub fn decide_at(
        &self,
        failure: &FailedAttempt,
        ctx: &mut RequestContext,
        now: DateTime<Utc>,
    ) -> RetryDecision {
        if !self.retry_on_error || ctx.retry_count > self.retry_limit {
            return RetryDecision::Fail(original_error(failure));
        }

        let response = match failure {
            FailedAttempt::Response(response) => response,
            FailedAttempt::Transport(error) if error.is_timeout() => {
                return RetryDecision::Fail(ApiError::timeout(self.timeout))
            }
            FailedAttempt::Transport(_) => return RetryDecision::Fail(original_error(failure)),
        };

        let rate_limit = RateLimitHeaders::from_headers(&response.headers);
        let status = response.status.as_u16();

        let delay = if rate_limit.is_exhausted() || status == 429 || status == 401 {
            rate_limit.retry_delay(now)
        } else if (self.retry_condition)(failure) {
            self.retry_delay
        } else {
            return RetryDecision::Fail(ApiError::from_response(response));
        };

        // The re-issue about to happen counts toward the limit
        ctx.retry_count += 1;
        if ctx.retry_count >= self.retry_limit {
            tracing::debug!(status, retry_count = ctx.retry_count, "retry limit reached");
            return RetryDecision::Fail(ApiError::from_response(response));
        }

        tracing::debug!(
            status,
            retry_count = ctx.retry_count,
            delay_ms = delay.as_millis() as u64,
            "scheduling retry"
        );
        RetryDecision::Retry { delay }
    }
}

/// The failure as it happened, without timeout rewriting
fn original_error(failure: &FailedAttempt) -> ApiError {
    match failure {
        FailedAttempt::Response(response) => ApiError::from_response(response),
        FailedAttempt::Transport(error) => ApiError::from_transport(error),
    }
}
