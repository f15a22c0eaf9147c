//! Response value object.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Status line of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub http_version: String,
    pub code: u16,
    pub message: String,
}

/// An HTTP response as stored in and replayed from a cassette.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: Status,
    headers: IndexMap<String, String>,
    body: Option<Vec<u8>>,
    /// Auxiliary transport metadata (timings and the like). Kept for
    /// introspection, never consulted by matching.
    info: BTreeMap<String, Value>,
}

impl Response {
    pub fn new(code: u16) -> Self {
        Self {
            status: Status {
                http_version: "1.1".to_string(),
                code,
                message: String::new(),
            },
            headers: IndexMap::new(),
            body: None,
            info: BTreeMap::new(),
        }
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.status.message = message.to_string();
        self
    }

    pub fn with_http_version(mut self, version: &str) -> Self {
        self.status.http_version = version.to_string();
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_info(mut self, key: &str, value: Value) -> Self {
        self.info.insert(key.to_string(), value);
        self
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn code(&self) -> u16 {
        self.status.code
    }

    pub fn headers(&self) -> &IndexMap<String, String> {
        &self.headers
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn info(&self) -> &BTreeMap<String, Value> {
        &self.info
    }

    /// Whether the body must travel through base64 in the cassette: gzip
    /// content or an explicitly binary transfer encoding.
    fn body_is_binary(&self) -> bool {
        let gzip = self
            .header("Content-Type")
            .is_some_and(|v| v.to_ascii_lowercase().contains("gzip"));
        let binary = self
            .header("Content-Transfer-Encoding")
            .is_some_and(|v| v.eq_ignore_ascii_case("binary"));
        gzip || binary
    }

    /// Serialize to the plain cassette record shape, omitting empty fields.
    pub fn to_record(&self) -> Value {
        let mut status = Map::new();
        if !self.status.http_version.is_empty() {
            status.insert(
                "http_version".to_string(),
                Value::String(self.status.http_version.clone()),
            );
        }
        status.insert("code".to_string(), Value::from(self.status.code));
        if !self.status.message.is_empty() {
            status.insert(
                "message".to_string(),
                Value::String(self.status.message.clone()),
            );
        }

        let mut record = Map::new();
        record.insert("status".to_string(), Value::Object(status));
        if !self.headers.is_empty() {
            let headers: Map<String, Value> = self
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            record.insert("headers".to_string(), Value::Object(headers));
        }
        if let Some(body) = self.body.as_ref().filter(|b| !b.is_empty()) {
            let encoded = if self.body_is_binary() {
                BASE64.encode(body)
            } else {
                String::from_utf8_lossy(body).into_owned()
            };
            record.insert("body".to_string(), Value::String(encoded));
        }
        if !self.info.is_empty() {
            let info: Map<String, Value> = self
                .info
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            record.insert("curl_info".to_string(), Value::Object(info));
        }
        Value::Object(record)
    }

    /// Reconstruct a response from a cassette record. `status` may be a
    /// mapping or a bare status code; absent fields take their defaults.
    pub fn from_record(record: &Value) -> Result<Self> {
        let obj = record
            .as_object()
            .ok_or_else(|| Error::MalformedRecord("response is not a mapping".to_string()))?;

        let status = match obj.get("status") {
            Some(Value::Object(status)) => Status {
                http_version: status
                    .get("http_version")
                    .and_then(Value::as_str)
                    .unwrap_or("1.1")
                    .to_string(),
                code: status
                    .get("code")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| Error::MalformedRecord("status has no code".to_string()))
                    .and_then(parse_code)?,
                message: status
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            },
            Some(Value::Number(code)) => Status {
                http_version: "1.1".to_string(),
                code: code
                    .as_u64()
                    .ok_or_else(|| Error::MalformedRecord("bad status code".to_string()))
                    .and_then(parse_code)?,
                message: String::new(),
            },
            _ => return Err(Error::MalformedRecord("response has no status".to_string())),
        };

        let mut headers = IndexMap::new();
        if let Some(stored) = obj.get("headers").and_then(Value::as_object) {
            for (name, value) in stored {
                if let Some(value) = super::collapse_header_value(value) {
                    headers.insert(name.clone(), value);
                }
            }
        }

        let mut response = Self {
            status,
            headers,
            body: None,
            info: BTreeMap::new(),
        };
        if let Some(body) = obj.get("body").and_then(Value::as_str) {
            if !body.is_empty() {
                response.body = Some(if response.body_is_binary() {
                    BASE64
                        .decode(body)
                        .map_err(|e| Error::MalformedRecord(format!("bad base64 body: {e}")))?
                } else {
                    body.as_bytes().to_vec()
                });
            }
        }
        if let Some(info) = obj.get("curl_info").and_then(Value::as_object) {
            for (key, value) in info {
                response.info.insert(key.clone(), value.clone());
            }
        }
        Ok(response)
    }
}

fn parse_code(raw: u64) -> Result<u16> {
    u16::try_from(raw)
        .map_err(|_| Error::MalformedRecord(format!("status code {raw} out of range")))
}
