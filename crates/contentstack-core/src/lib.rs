//! Contentstack Core - shared HTTP plumbing for the content delivery SDKs
//!
//! This crate provides the request layer the delivery SDKs build on:
//! client construction from options, query-string serialization, request
//! dispatch with live preview support, rate-limit aware retries and a single
//! normalized error shape.
//!
//! # Main Components
//!
//! - **Configuration**: [`ClientConfig`] options, resolved into defaults by the client
//! - **Client**: [`HttpClient`] with a pluggable [`Transport`](http::Transport)
//! - **Dispatch**: [`get_data`] with URL length management
//! - **Errors**: [`ApiError`] for failed requests, [`Error`] for construction
//!
//! # Example
//!
//! ```no_run
//! use contentstack_core::{ClientConfig, HttpClient, Params};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = ClientConfig::new()
//!         .with_api_key("api_key")
//!         .with_access_token("delivery_token");
//!     let client = HttpClient::new(&options)?;
//!
//!     let mut params = Params::new();
//!     params.insert("include".into(), serde_json::json!(["author"]));
//!     let entries = client.get_data("/content_types/blog/entries", params).await?;
//!     println!("{}", entries);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod logging;

// Re-export main types for convenience
pub use config::{ClientConfig, ClientSettings, LivePreviewConfig, StackConfig};
pub use error::{Error, Result};
pub use http::{get_data, serialize, ApiError, ArrayFormat, HttpClient, Params, RequestOptions};
pub use logging::LogLevel;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
