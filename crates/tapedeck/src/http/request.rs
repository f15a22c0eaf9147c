//! Request value object.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::error::{Error, Result};

/// Transport option key whose value overrides the request method for both
/// matching and execution (the moral equivalent of curl's CUSTOMREQUEST).
pub const CUSTOM_METHOD_OPTION: &str = "custom_method";

/// One file attached to a multipart POST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostFile {
    pub field_name: String,
    pub content_type: String,
    pub filename: String,
    pub postname: String,
}

/// An outgoing HTTP request as seen by the cassette engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: String,
    url: Url,
    headers: IndexMap<String, String>,
    body: Option<String>,
    post_fields: IndexMap<String, String>,
    post_files: Vec<PostFile>,
    /// Transport options (method override and friends). Runtime-only,
    /// never serialized into the cassette.
    options: BTreeMap<String, Value>,
}

impl Request {
    /// Build a request from a method and an absolute URL.
    ///
    /// Fails when the URL carries no parseable host. The `Host` header is
    /// derived from the URL; an explicit `set_header("Host", ..)` afterwards
    /// replaces it and is never overwritten again.
    pub fn new(method: &str, url: &str) -> Result<Self> {
        Self::from_parts(method, url, IndexMap::new())
    }

    /// Build a request from pre-existing headers (cassette reads). A `Host`
    /// header already present in `headers` wins over the URL-derived one.
    pub fn from_parts(method: &str, url: &str, headers: IndexMap<String, String>) -> Result<Self> {
        let parsed =
            Url::parse(url).map_err(|_| Error::InvalidHost(url.to_string()))?;
        if parsed.host_str().is_none() {
            return Err(Error::InvalidHost(url.to_string()));
        }

        let mut request = Self {
            method: method.to_uppercase(),
            url: parsed,
            headers,
            body: None,
            post_fields: IndexMap::new(),
            post_files: Vec::new(),
            options: BTreeMap::new(),
        };
        if !request.headers.contains_key("Host") {
            let host = request.host();
            request.headers.insert("Host".to_string(), host);
        }
        Ok(request)
    }

    /// The effective method: a `custom_method` transport option always wins
    /// over the base method field.
    pub fn method(&self) -> String {
        self.options
            .get(CUSTOM_METHOD_OPTION)
            .and_then(Value::as_str)
            .map(str::to_uppercase)
            .unwrap_or_else(|| self.method.clone())
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Host, with the explicit port when the URL carries a non-default one.
    pub fn host(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.url.query()
    }

    pub fn headers(&self) -> &IndexMap<String, String> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn post_fields(&self) -> &IndexMap<String, String> {
        &self.post_fields
    }

    pub fn post_files(&self) -> &[PostFile] {
        &self.post_files
    }

    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    pub fn set_method(&mut self, method: &str) {
        self.method = method.to_uppercase();
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.insert(name.to_string(), value.to_string());
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = Some(body.into());
    }

    /// Switch to POST semantics with form fields. Does not touch transport
    /// options, so an earlier `custom_method` override stays in force.
    pub fn set_post_fields(&mut self, fields: IndexMap<String, String>) {
        self.method = "POST".to_string();
        self.post_fields = fields;
    }

    pub fn set_post_field(&mut self, name: &str, value: &str) {
        self.post_fields.insert(name.to_string(), value.to_string());
    }

    pub fn add_post_file(&mut self, file: PostFile) {
        self.post_files.push(file);
    }

    pub fn set_option(&mut self, key: &str, value: Value) {
        self.options.insert(key.to_string(), value);
    }

    /// Serialize to the plain cassette record shape, omitting empty fields.
    pub fn to_record(&self) -> Value {
        let mut record = Map::new();
        record.insert("method".to_string(), Value::String(self.method()));
        record.insert("url".to_string(), Value::String(self.url.to_string()));
        if !self.headers.is_empty() {
            let headers: Map<String, Value> = self
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            record.insert("headers".to_string(), Value::Object(headers));
        }
        if let Some(body) = self.body.as_ref().filter(|b| !b.is_empty()) {
            record.insert("body".to_string(), Value::String(body.clone()));
        }
        if !self.post_fields.is_empty() {
            let fields: Map<String, Value> = self
                .post_fields
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            record.insert("post_fields".to_string(), Value::Object(fields));
        }
        if !self.post_files.is_empty() {
            let files = self
                .post_files
                .iter()
                .map(|f| serde_json::to_value(f).unwrap_or(Value::Null))
                .collect();
            record.insert("post_files".to_string(), Value::Array(files));
        }
        Value::Object(record)
    }

    /// Reconstruct a request from a cassette record. Absent fields take
    /// their defaults; a missing url or host is a malformed record.
    pub fn from_record(record: &Value) -> Result<Self> {
        let obj = record
            .as_object()
            .ok_or_else(|| Error::MalformedRecord("request is not a mapping".to_string()))?;
        let method = obj
            .get("method")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MalformedRecord("request has no method".to_string()))?;
        let url = obj
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MalformedRecord("request has no url".to_string()))?;

        let mut headers = IndexMap::new();
        if let Some(stored) = obj.get("headers").and_then(Value::as_object) {
            for (name, value) in stored {
                if let Some(value) = super::collapse_header_value(value) {
                    headers.insert(name.clone(), value);
                }
            }
        }

        let mut request = Self::from_parts(method, url, headers)?;
        if let Some(body) = obj.get("body").and_then(Value::as_str) {
            request.body = Some(body.to_string());
        }
        if let Some(fields) = obj.get("post_fields").and_then(Value::as_object) {
            for (name, value) in fields {
                if let Some(value) = value.as_str() {
                    request.post_fields.insert(name.clone(), value.to_string());
                }
            }
        }
        if let Some(files) = obj.get("post_files").and_then(Value::as_array) {
            for file in files {
                let file: PostFile = serde_json::from_value(file.clone())
                    .map_err(|e| Error::MalformedRecord(format!("bad post_files entry: {e}")))?;
                request.post_files.push(file);
            }
        }
        Ok(request)
    }
}
