//! Logging hooks for SDK consumers
//!
//! Internal diagnostics go through `tracing`. Consumers of the delivery SDKs
//! additionally get a plain callback, the log handler, which receives a level
//! and a message for retries and terminal failures.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Level passed to the log handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warning,
    Info,
    Debug,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Error => "error",
            LogLevel::Warning => "warning",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        f.write_str(name)
    }
}

/// Errors go to stderr, everything else to stdout
pub fn default_log_handler(level: LogLevel, message: &str) {
    match level {
        LogLevel::Error => {
            if !message.is_empty() {
                eprintln!("[{}] {}", level, message);
            }
        }
        _ => println!("[{}] {}", level, message),
    }
}

/// Credential masking for anything that ends up in errors or logs
pub mod redaction {
    use std::collections::BTreeMap;

    use reqwest::header::HeaderMap;

    const VISIBLE_SUFFIX: usize = 5;

    /// Keep only the last five characters of a token
    pub fn mask_token(token: &str) -> String {
        let chars: Vec<char> = token.chars().collect();
        let start = chars.len().saturating_sub(VISIBLE_SUFFIX);
        format!("...{}", chars[start..].iter().collect::<String>())
    }

    /// Check if a header name carries credentials
    pub fn is_sensitive_key(key: &str) -> bool {
        let key_lower = key.to_lowercase();
        key_lower.contains("key")
            || key_lower.contains("token")
            || key_lower.contains("secret")
            || key_lower.contains("authorization")
    }

    /// Copy headers into a plain map with credential values masked
    pub fn redact_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
        headers
            .iter()
            .map(|(name, value)| {
                let text = value.to_str().unwrap_or("<binary>");
                let text = if is_sensitive_key(name.as_str()) {
                    mask_token(text)
                } else {
                    text.to_string()
                };
                (name.as_str().to_string(), text)
            })
            .collect()
    }
}
