//! Secret scrubbing at the storage boundary.
//!
//! Redactions map a replacement token to a secret, either literal or
//! produced by a callback evaluated once per record operation. Scrubbing
//! substitutes secret→token over every string leaf of the serialized
//! record before it hits disk; unscrubbing reverses the substitution on
//! read so matching still sees real values. Substitution is plain
//! multi-needle string replacement (leftmost-longest), not regex.

use std::fmt;
use std::sync::Arc;

use aho_corasick::{AhoCorasickBuilder, MatchKind};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::http::{Request, Response};

type RedactionCallback = Arc<dyn Fn(&Request, &Response) -> Option<String> + Send + Sync>;

/// Where a redaction's secret value comes from.
#[derive(Clone)]
pub enum RedactionSource {
    Literal(String),
    Callback(RedactionCallback),
}

/// One token→secret redaction rule.
#[derive(Clone)]
pub struct Redaction {
    token: String,
    source: RedactionSource,
}

impl Redaction {
    pub fn literal(token: &str, secret: &str) -> Self {
        Self {
            token: token.to_string(),
            source: RedactionSource::Literal(secret.to_string()),
        }
    }

    pub fn callback<F>(token: &str, callback: F) -> Self
    where
        F: Fn(&Request, &Response) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            token: token.to_string(),
            source: RedactionSource::Callback(Arc::new(callback)),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Current secret value for this interaction; `None` when the callback
    /// abstains or the secret is empty.
    fn resolve(&self, request: &Request, response: &Response) -> Option<String> {
        let secret = match &self.source {
            RedactionSource::Literal(secret) => Some(secret.clone()),
            RedactionSource::Callback(callback) => callback(request, response),
        };
        secret.filter(|s| !s.is_empty())
    }
}

impl fmt::Debug for Redaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.source {
            RedactionSource::Literal(_) => "literal",
            RedactionSource::Callback(_) => "callback",
        };
        f.debug_struct("Redaction")
            .field("token", &self.token)
            .field("source", &source)
            .finish()
    }
}

/// Bidirectional substitution pipeline applied around storage.
#[derive(Debug, Clone, Default)]
pub struct Scrubber {
    redactions: Vec<Redaction>,
}

impl Scrubber {
    pub fn new(redactions: Vec<Redaction>) -> Self {
        Self { redactions }
    }

    pub fn is_empty(&self) -> bool {
        self.redactions.is_empty()
    }

    fn resolved(&self, request: &Request, response: &Response) -> Vec<(String, String)> {
        self.redactions
            .iter()
            .filter_map(|r| r.resolve(request, response).map(|s| (s, r.token.clone())))
            .collect()
    }

    /// Serialize the interaction to a plain record with every occurrence of
    /// every secret replaced by its token.
    pub fn scrub(&self, request: &Request, response: &Response) -> Value {
        let mut record = Map::new();
        record.insert("request".to_string(), request.to_record());
        record.insert("response".to_string(), response.to_record());
        let mut record = Value::Object(record);

        let pairs = self.resolved(request, response);
        if !pairs.is_empty() {
            substitute(&mut record, &pairs);
        }
        record
    }

    /// Reverse the substitution on a record read back from storage,
    /// evaluating redactions against the reconstructed (still scrubbed)
    /// request/response.
    pub fn unscrub(&self, record: &Value) -> Result<Value> {
        let request = Request::from_record(
            record
                .get("request")
                .ok_or_else(|| Error::MalformedRecord("record has no request".to_string()))?,
        )?;
        let response = Response::from_record(
            record
                .get("response")
                .ok_or_else(|| Error::MalformedRecord("record has no response".to_string()))?,
        )?;

        let mut restored = record.clone();
        let pairs: Vec<(String, String)> = self
            .resolved(&request, &response)
            .into_iter()
            .map(|(secret, token)| (token, secret))
            .collect();
        if !pairs.is_empty() {
            substitute(&mut restored, &pairs);
        }
        Ok(restored)
    }
}

/// Recursively replace every needle with its counterpart across the string
/// leaf values of `value`. Keys and non-string values stay untouched.
fn substitute(value: &mut Value, pairs: &[(String, String)]) {
    let automaton = AhoCorasickBuilder::new()
        .match_kind(MatchKind::LeftmostLongest)
        .build(pairs.iter().map(|(needle, _)| needle.as_str()))
        .expect("redaction needles build a valid automaton");
    let replacements: Vec<&str> = pairs.iter().map(|(_, r)| r.as_str()).collect();
    walk(value, &mut |leaf| {
        if automaton.is_match(leaf.as_str()) {
            *leaf = automaton.replace_all(leaf, &replacements);
        }
    });
}

fn walk(value: &mut Value, replace: &mut impl FnMut(&mut String)) {
    match value {
        Value::String(leaf) => replace(leaf),
        Value::Array(items) => items.iter_mut().for_each(|v| walk(v, replace)),
        Value::Object(map) => map.values_mut().for_each(|v| walk(v, replace)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interaction() -> (Request, Response) {
        let mut request = Request::new("GET", "http://example.com/login").unwrap();
        request.set_header("Authorization", "Bearer sekrit");
        let response = Response::new(200).with_body("token sekrit accepted");
        (request, response)
    }

    #[test]
    fn scrub_replaces_every_occurrence() {
        let scrubber = Scrubber::new(vec![Redaction::literal("<TOK>", "sekrit")]);
        let (request, response) = interaction();
        let record = scrubber.scrub(&request, &response);

        let serialized = serde_json::to_string(&record).unwrap();
        assert!(!serialized.contains("sekrit"));
        assert_eq!(record["request"]["headers"]["Authorization"], "Bearer <TOK>");
        assert_eq!(record["response"]["body"], "token <TOK> accepted");
    }

    #[test]
    fn unscrub_is_the_exact_inverse() {
        let scrubber = Scrubber::new(vec![Redaction::literal("<TOK>", "sekrit")]);
        let (request, response) = interaction();
        let scrubbed = scrubber.scrub(&request, &response);
        let restored = scrubber.unscrub(&scrubbed).unwrap();

        let mut plain = Map::new();
        plain.insert("request".to_string(), request.to_record());
        plain.insert("response".to_string(), response.to_record());
        assert_eq!(restored, Value::Object(plain));
    }

    #[test]
    fn callback_redactions_see_the_interaction() {
        let scrubber = Scrubber::new(vec![Redaction::callback("<AUTH>", |req, _resp| {
            req.header("Authorization")
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::to_string)
        })]);
        let (request, response) = interaction();
        let record = scrubber.scrub(&request, &response);
        assert_eq!(record["request"]["headers"]["Authorization"], "Bearer <AUTH>");
    }

    #[test]
    fn empty_secrets_are_skipped() {
        let scrubber = Scrubber::new(vec![
            Redaction::literal("<EMPTY>", ""),
            Redaction::callback("<NONE>", |_, _| None),
        ]);
        let (request, response) = interaction();
        let record = scrubber.scrub(&request, &response);
        let serialized = serde_json::to_string(&record).unwrap();
        assert!(!serialized.contains("<EMPTY>"));
        assert!(!serialized.contains("<NONE>"));
    }

    #[test]
    fn longer_secrets_win_over_their_prefixes() {
        let scrubber = Scrubber::new(vec![
            Redaction::literal("<SHORT>", "secret"),
            Redaction::literal("<LONG>", "secret-key"),
        ]);
        let mut request = Request::new("GET", "http://example.com/").unwrap();
        request.set_body("value=secret-key");
        let record = scrubber.scrub(&request, &Response::new(200));
        assert_eq!(record["request"]["body"], "value=<LONG>");
    }

    #[test]
    fn keys_are_never_scrubbed() {
        let scrubber = Scrubber::new(vec![Redaction::literal("<TOK>", "Authorization")]);
        let (request, response) = interaction();
        let record = scrubber.scrub(&request, &response);
        assert!(record["request"]["headers"]
            .as_object()
            .unwrap()
            .contains_key("Authorization"));
    }
}
