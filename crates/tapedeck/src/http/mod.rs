//! HTTP message model: the request/response pair making up one interaction.
//!
//! Both types serialize to and from a plain key-value record
//! (`serde_json::Value`) with omit-empty semantics, so the same shape works
//! for the JSON and YAML cassette encodings.

mod request;
mod response;

pub use request::{PostFile, Request, CUSTOM_METHOD_OPTION};
pub use response::{Response, Status};

use serde_json::Value;

/// Read a header value from a record, collapsing repeated headers
/// (stored as an array) with ", " the way origin servers join them.
pub(crate) fn collapse_header_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        Value::Null => Some(String::new()),
        other => Some(other.to_string()),
    }
}
