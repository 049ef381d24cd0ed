//! Rate limit header interpretation
//!
//! The content API meters requests with a token bucket and reports its state
//! in response headers. When the bucket is empty the client waits for the
//! server's own replenishment hint instead of guessing a backoff.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;

pub const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";
pub const RATE_LIMIT_RESET_TIME: &str = "x-ratelimit-reset-time";
pub const RETRY_AFTER: &str = "retry-after";

/// Delay used when no replenishment hint is present
pub const DEFAULT_RATE_LIMIT_DELAY: Duration = Duration::from_millis(1000);
/// Lower bound for delays derived from reset timestamps
pub const MIN_RATE_LIMIT_DELAY: Duration = Duration::from_millis(1000);
/// Added to reset timestamps to absorb clock skew
const RESET_BUFFER_MS: i64 = 1000;

/// Rate limit state reported by one response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitHeaders {
    /// Tokens left in the bucket
    pub remaining: Option<f64>,
    /// Seconds to wait, from `retry-after`
    pub retry_after: Option<f64>,
    /// Unix timestamp (seconds) of the next refill
    pub reset: Option<i64>,
    /// Time of the next refill, from an ISO 8601 header
    pub reset_time: Option<DateTime<Utc>>,
}

impl RateLimitHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            remaining: header_str(headers, RATE_LIMIT_REMAINING).and_then(|v| v.parse().ok()),
            retry_after: header_str(headers, RETRY_AFTER)
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|secs| secs.is_finite() && *secs >= 0.0),
            reset: header_str(headers, RATE_LIMIT_RESET).and_then(|v| v.parse().ok()),
            reset_time: header_str(headers, RATE_LIMIT_RESET_TIME)
                .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
                .map(|t| t.with_timezone(&Utc)),
        }
    }

    /// The bucket is reported empty
    pub fn is_exhausted(&self) -> bool {
        self.remaining.map(|r| r <= 0.0).unwrap_or(false)
    }

    /// How long to wait before the next attempt.
    ///
    /// `retry-after` wins, then `x-ratelimit-reset`, then
    /// `x-ratelimit-reset-time`. Timestamp-derived delays include a one second
    /// buffer and never drop below [`MIN_RATE_LIMIT_DELAY`].
    pub fn retry_delay(&self, now: DateTime<Utc>) -> Duration {
        if let Some(secs) = self.retry_after {
            return Duration::from_millis((secs * 1000.0) as u64);
        }
        if let Some(reset) = self.reset {
            return delay_until(reset.saturating_mul(1000), now);
        }
        if let Some(reset_time) = self.reset_time {
            return delay_until(reset_time.timestamp_millis(), now);
        }
        DEFAULT_RATE_LIMIT_DELAY
    }
}

/// Compute the replenishment delay for a set of response headers
pub fn calculate_rate_limit_delay(headers: &HeaderMap) -> Duration {
    RateLimitHeaders::from_headers(headers).retry_delay(Utc::now())
}

fn delay_until(target_ms: i64, now: DateTime<Utc>) -> Duration {
    let delay_ms = target_ms
        .saturating_sub(now.timestamp_millis())
        .saturating_add(RESET_BUFFER_MS);
    let min_ms = MIN_RATE_LIMIT_DELAY.as_millis() as i64;
    Duration::from_millis(delay_ms.max(min_ms) as u64)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_500).unwrap()
    }

    fn headers(pairs: &[(&'static str, String)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, value.parse().unwrap());
        }
        map
    }

    #[test]
    fn test_retry_after_seconds() {
        let h = RateLimitHeaders::from_headers(&headers(&[(RETRY_AFTER, "5".into())]));
        assert_eq!(h.retry_delay(now()), Duration::from_millis(5000));
    }

    #[test]
    fn test_reset_timestamp_with_buffer() {
        let reset = (now().timestamp_millis() + 3000) / 1000;
        let h = RateLimitHeaders::from_headers(&headers(&[(RATE_LIMIT_RESET, reset.to_string())]));
        assert_eq!(h.retry_delay(now()), Duration::from_millis(3500));
    }

    #[test]
    fn test_reset_in_the_past_uses_minimum() {
        let reset = (now().timestamp_millis() - 5000) / 1000;
        let h = RateLimitHeaders::from_headers(&headers(&[(RATE_LIMIT_RESET, reset.to_string())]));
        assert_eq!(h.retry_delay(now()), MIN_RATE_LIMIT_DELAY);
    }

    #[test]
    fn test_reset_time_iso() {
        let future = now() + chrono::Duration::milliseconds(2500);
        let h = RateLimitHeaders::from_headers(&headers(&[(
            RATE_LIMIT_RESET_TIME,
            future.to_rfc3339(),
        )]));
        assert_eq!(h.retry_delay(now()), Duration::from_millis(3500));

        let past = now() - chrono::Duration::milliseconds(3000);
        let h = RateLimitHeaders::from_headers(&headers(&[(RATE_LIMIT_RESET_TIME, past.to_rfc3339())]));
        assert_eq!(h.retry_delay(now()), MIN_RATE_LIMIT_DELAY);
    }

    #[test]
    fn test_default_without_hints() {
        let h = RateLimitHeaders::from_headers(&headers(&[
            ("content-type", "application/json".into()),
            ("cache-control", "no-cache".into()),
        ]));
        assert_eq!(h.retry_delay(now()), DEFAULT_RATE_LIMIT_DELAY);
    }

    #[test]
    fn test_precedence() {
        let reset = (now().timestamp_millis() + 10_000) / 1000;
        let reset_time = (now() + chrono::Duration::seconds(15)).to_rfc3339();
        let h = RateLimitHeaders::from_headers(&headers(&[
            (RETRY_AFTER, "2".into()),
            (RATE_LIMIT_RESET, reset.to_string()),
            (RATE_LIMIT_RESET_TIME, reset_time.clone()),
        ]));
        assert_eq!(h.retry_delay(now()), Duration::from_millis(2000));

        let reset = (now().timestamp_millis() + 5000) / 1000;
        let h = RateLimitHeaders::from_headers(&headers(&[
            (RATE_LIMIT_RESET, reset.to_string()),
            (RATE_LIMIT_RESET_TIME, reset_time),
        ]));
        assert_eq!(h.retry_delay(now()), Duration::from_millis(5500));
    }

    #[test]
    fn test_extreme_reset_values() {
        let h = RateLimitHeaders::from_headers(&headers(&[(RATE_LIMIT_RESET, i64::MIN.to_string())]));
        assert_eq!(h.reset, Some(i64::MIN));
        assert_eq!(h.retry_delay(now()), MIN_RATE_LIMIT_DELAY);

        let h = RateLimitHeaders::from_headers(&headers(&[(RATE_LIMIT_RESET, i64::MAX.to_string())]));
        assert!(h.retry_delay(now()) > Duration::from_secs(86_400 * 365));
    }

    #[test]
    fn test_calculate_rate_limit_delay() {
        assert_eq!(
            calculate_rate_limit_delay(&headers(&[(RETRY_AFTER, "5".into())])),
            Duration::from_millis(5000)
        );
        assert_eq!(calculate_rate_limit_delay(&HeaderMap::new()), DEFAULT_RATE_LIMIT_DELAY);

        let reset = (Utc::now().timestamp_millis() - 60_000) / 1000;
        assert_eq!(
            calculate_rate_limit_delay(&headers(&[(RATE_LIMIT_RESET, reset.to_string())])),
            MIN_RATE_LIMIT_DELAY
        );
    }

    #[test]
    fn test_exhaustion() {
        let exhausted = RateLimitHeaders::from_headers(&headers(&[(RATE_LIMIT_REMAINING, "0".into())]));
        assert!(exhausted.is_exhausted());

        let available = RateLimitHeaders::from_headers(&headers(&[(RATE_LIMIT_REMAINING, "5".into())]));
        assert!(!available.is_exhausted());

        assert!(!RateLimitHeaders::from_headers(&HeaderMap::new()).is_exhausted());

        let garbage = RateLimitHeaders::from_headers(&headers(&[(RATE_LIMIT_REMAINING, "n/a".into())]));
        assert!(!garbage.is_exhausted());
    }
}
