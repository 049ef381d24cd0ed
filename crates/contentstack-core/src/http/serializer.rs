//! Query-string serialization for content API parameters
//!
//! Parameters are encoded the way the content API expects them: arrays as
//! repeated `key[]=v` pairs (or one comma-joined pair in compact form),
//! nested objects as `parent[child]=v`, and the reserved `query` filter as a
//! percent-encoded JSON document appended last.

use serde_json::{Map, Value};

use crate::http::error::is_truthy;

/// Request parameters, in insertion order
pub type Params = Map<String, Value>;

/// Reserved key holding the structured query filter
pub const QUERY_KEY: &str = "query";

/// How array values are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrayFormat {
    /// `include[]=a&include[]=b`
    #[default]
    Brackets,
    /// `include=a,b`
    Comma,
}

/// Serialize parameters into a query string (without the leading `?`).
///
/// The `query` entry is never encoded as a regular pair. When present it is
/// appended as `&query=<encoded JSON>`, even when nothing precedes it.
pub fn serialize(params: &Params, format: ArrayFormat) -> String {
    let mut pairs = Vec::new();
    for (key, value) in params.iter().filter(|(key, _)| key.as_str() != QUERY_KEY) {
        encode_value(key, value, format, &mut pairs);
    }

    let mut qs = pairs.join("&");
    if let Some(query) = params.get(QUERY_KEY).filter(|q| is_truthy(q)) {
        qs.push_str("&query=");
        qs.push_str(&urlencoding::encode(&query.to_string()));
    }
    qs
}

fn encode_value(key: &str, value: &Value, format: ArrayFormat, pairs: &mut Vec<String>) {
    match value {
        Value::Null => pairs.push(format!("{}=", urlencoding::encode(key))),
        Value::Array(items) => encode_array(key, items, format, pairs),
        Value::Object(map) => {
            for (child, nested) in map {
                encode_value(&format!("{}[{}]", key, child), nested, format, pairs);
            }
        }
        scalar => pairs.push(format!(
            "{}={}",
            urlencoding::encode(key),
            urlencoding::encode(&scalar_text(scalar))
        )),
    }
}

fn encode_array(key: &str, items: &[Value], format: ArrayFormat, pairs: &mut Vec<String>) {
    if items.is_empty() {
        return;
    }
    match format {
        ArrayFormat::Brackets => {
            let item_key = format!("{}[]", key);
            for item in items {
                encode_value(&item_key, item, format, pairs);
            }
        }
        ArrayFormat::Comma => {
            let joined = items
                .iter()
                .map(|item| urlencoding::encode(&scalar_text(item)).into_owned())
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(format!("{}={}", urlencoding::encode(key), joined));
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
