//! Request dispatch
//!
//! [`get_data`] turns a path and a set of parameters into a
//! [`PreparedRequest`]: it applies live preview, picks the query-string form
//! that fits the URL length limit, runs the request through the client's
//! retry loop and unwraps the payload.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

use crate::config::LivePreviewConfig;
use crate::http::client::HttpClient;
use crate::http::error::ApiError;
use crate::http::serializer::{serialize, ArrayFormat, Params};
use crate::http::transport::{append_query, PreparedRequest};

/// Longest URL sent to the delivery host
pub const MAX_URL_LENGTH: usize = 2000;
/// Longest URL sent to the live preview host
pub const LIVE_PREVIEW_MAX_URL_LENGTH: usize = 1500;

pub const LIVE_PREVIEW_PARAM: &str = "live_preview";
pub const LIVE_PREVIEW_HEADER: &str = "live_preview";
pub const PREVIEW_TOKEN_HEADER: &str = "preview_token";

/// Per-call parameters and headers
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub params: Params,
    /// Merged over the client's default headers
    pub headers: HeaderMap,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

impl From<Params> for RequestOptions {
    fn from(params: Params) -> Self {
        Self {
            params,
            headers: HeaderMap::new(),
        }
    }
}

/// Fetch a JSON document from the content API.
///
/// `url` is either absolute, and used verbatim, or a path relative to the
/// client's base URL. The caller's options are never modified.
pub async fn get_data(
    client: &HttpClient,
    url: &str,
    options: impl Into<RequestOptions>,
) -> Result<Value, ApiError> {
    let RequestOptions {
        mut params,
        headers: extra_headers,
    } = options.into();

    let mut headers = client.default_headers().clone();
    headers.extend(extra_headers);

    let mut target = combine_urls(client.base_url(), url);
    let mut max_length = MAX_URL_LENGTH;

    if let Some(live_preview) = client.stack_config().and_then(|s| s.live_preview) {
        if live_preview.enable {
            params.insert(
                LIVE_PREVIEW_PARAM.to_string(),
                Value::String(live_preview.hash().to_string()),
            );
        }
        if let Some(token) = live_preview.preview_token.as_deref() {
            insert_preview_header(&mut headers, PREVIEW_TOKEN_HEADER, token)?;
            if let Some(hash) = live_preview.live_preview.as_deref() {
                insert_preview_header(&mut headers, LIVE_PREVIEW_HEADER, hash)?;
            }
        }
        if live_preview.requires_redirect() {
            target = preview_target(&live_preview, url)?;
            max_length = LIVE_PREVIEW_MAX_URL_LENGTH;
        }
    }

    let request = prepare(target, params, headers, client, max_length)?;
    let response = client.execute(request).await?;
    let status = response.status.as_u16();

    match response.body {
        None | Some(Value::Null) => Err(ApiError::malformed_response(status)),
        Some(Value::String(text)) if text.is_empty() => Err(ApiError::malformed_response(status)),
        Some(body) => Ok(body),
    }
}

/// Choose the query-string form that keeps the URL under `max_length`
fn prepare(
    target: String,
    params: Params,
    headers: HeaderMap,
    client: &HttpClient,
    max_length: usize,
) -> Result<PreparedRequest, ApiError> {
    let candidate = append_query(&target, &serialize(&params, ArrayFormat::Brackets));
    if candidate.len() <= max_length {
        tracing::debug!(url = %candidate, "dispatching request");
        return Ok(PreparedRequest::standard(target, params, headers, client.timeout()));
    }

    let compact = append_query(&target, &serialize(&params, ArrayFormat::Comma));
    if compact.len() > max_length {
        tracing::error!(
            length = compact.len(),
            max_length,
            "request URL too long even with compact arrays"
        );
        return Err(ApiError::url_too_long(compact.len(), max_length));
    }

    tracing::debug!(
        url = %compact,
        original_length = candidate.len(),
        "dispatching request with compact arrays"
    );
    Ok(PreparedRequest::assembled(compact, headers, client.timeout()))
}

/// The live preview host with `https://` assumed, joined with the request path
fn preview_target(live_preview: &LivePreviewConfig, url: &str) -> Result<String, ApiError> {
    let host = live_preview
        .host
        .as_deref()
        .filter(|h| !h.is_empty())
        .ok_or_else(ApiError::host_required)?;

    let host = if is_absolute(host) {
        host.to_string()
    } else {
        format!("https://{}", host)
    };
    Ok(combine_urls(&host, url))
}

fn insert_preview_header(headers: &mut HeaderMap, name: &'static str, value: &str) -> Result<(), ApiError> {
    let value = HeaderValue::from_str(value).map_err(|_| ApiError::invalid_header(name))?;
    headers.insert(name, value);
    Ok(())
}

fn is_absolute(url: &str) -> bool {
    let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Join a base URL and a path with exactly one `/`; absolute URLs pass through
pub fn combine_urls(base: &str, url: &str) -> String {
    if is_absolute(url) {
        return url.to_string();
    }
    if url.is_empty() {
        return base.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        url.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_urls() {
        assert_eq!(
            combine_urls("https://cdn.example.com:443/v3", "/entries"),
            "https://cdn.example.com:443/v3/entries"
        );
        assert_eq!(
            combine_urls("https://cdn.example.com:443/v3/", "entries"),
            "https://cdn.example.com:443/v3/entries"
        );
        assert_eq!(
            combine_urls("https://cdn.example.com:443/v3", ""),
            "https://cdn.example.com:443/v3"
        );
        assert_eq!(
            combine_urls("https://cdn.example.com:443/v3", "https://other.example.com/x"),
            "https://other.example.com/x"
        );
        assert_eq!(
            combine_urls("https://cdn.example.com:443/v3", "HTTP://other.example.com/x"),
            "HTTP://other.example.com/x"
        );
    }

    #[test]
    fn test_preview_target() {
        let mut live_preview = LivePreviewConfig {
            enable: true,
            live_preview: Some("abc".into()),
            host: Some("rest-preview.example.com".into()),
            ..Default::default()
        };
        assert_eq!(
            preview_target(&live_preview, "/content_types/blog/entries").unwrap(),
            "https://rest-preview.example.com/content_types/blog/entries"
        );

        live_preview.host = Some("https://rest-preview.example.com".into());
        assert_eq!(
            preview_target(&live_preview, "/entries").unwrap(),
            "https://rest-preview.example.com/entries"
        );

        live_preview.host = None;
        let error = preview_target(&live_preview, "/entries").unwrap_err();
        assert_eq!(error.error_message, "Host is required for live preview");
    }

    #[test]
    fn test_request_options_builders() {
        let options = RequestOptions::new()
            .with_param("locale", "en-us")
            .with_param("limit", 10)
            .with_header(HeaderName::from_static("branch"), HeaderValue::from_static("main"));
        assert_eq!(options.params["locale"], "en-us");
        assert_eq!(options.params["limit"], 10);
        assert_eq!(options.headers.get("branch").unwrap(), "main");
    }
}
