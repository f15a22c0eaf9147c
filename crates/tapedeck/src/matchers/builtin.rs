//! The built-in matcher set.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use tracing::warn;

use super::RequestMatcher;
use crate::http::Request;

/// Escape `#` so stored values lifted straight out of cassettes stay valid
/// patterns (legacy cassettes assumed `#`-delimited patterns).
fn escape_pattern(value: &str) -> String {
    value.replace('#', "\\#")
}

/// Regex-match `value` against a pattern taken from a stored request,
/// degrading to literal equality when the pattern does not compile.
fn pattern_matches(pattern: &str, value: &str, case_insensitive: bool) -> bool {
    let built = RegexBuilder::new(&escape_pattern(pattern))
        .case_insensitive(case_insensitive)
        .build();
    match built {
        Ok(re) => re.is_match(value),
        Err(_) => {
            warn!(pattern, "stored value is not a valid pattern, comparing literally");
            if case_insensitive {
                pattern.eq_ignore_ascii_case(value)
            } else {
                pattern == value
            }
        }
    }
}

/// Case-normalized method equality; a custom-method transport option on
/// either side already won inside `Request::method`.
pub struct MethodMatcher;

impl RequestMatcher for MethodMatcher {
    fn matches(&self, stored: &Request, incoming: &Request) -> bool {
        stored.method() == incoming.method()
    }
}

/// Path-only URL match: the stored path is a pattern applied to the
/// percent-decoded incoming path. An empty stored path matches anything.
pub struct UrlMatcher;

impl RequestMatcher for UrlMatcher {
    fn matches(&self, stored: &Request, incoming: &Request) -> bool {
        if stored.path().is_empty() {
            return true;
        }
        // Both sides are percent-decoded: URL parsing re-encodes paths, and
        // the pattern must see the same bytes its recording saw.
        let pattern = decode_path(stored.path());
        let decoded = decode_path(incoming.path());
        pattern_matches(&pattern, &decoded, false)
    }
}

fn decode_path(path: &str) -> String {
    urlencoding::decode(path)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

/// Case-insensitive host pattern match.
pub struct HostMatcher;

impl RequestMatcher for HostMatcher {
    fn matches(&self, stored: &Request, incoming: &Request) -> bool {
        pattern_matches(&stored.host(), &incoming.host(), true)
    }
}

/// Stored headers are a pattern map: every stored header must be present
/// in the incoming request with a pattern-matching value. Headers absent
/// from the stored request are not constrained. An empty stored value is
/// satisfied whether the incoming header is absent, empty or set.
pub struct HeadersMatcher;

impl RequestMatcher for HeadersMatcher {
    fn matches(&self, stored: &Request, incoming: &Request) -> bool {
        stored.headers().iter().all(|(name, pattern)| {
            if pattern.is_empty() {
                return true;
            }
            match incoming.header(name) {
                Some(value) => pattern_matches(pattern, value, false),
                None => false,
            }
        })
    }
}

/// Exact body equality; an absent stored body matches anything.
pub struct BodyMatcher;

impl RequestMatcher for BodyMatcher {
    fn matches(&self, stored: &Request, incoming: &Request) -> bool {
        match stored.body() {
            None => true,
            Some(body) => incoming.body() == Some(body),
        }
    }
}

/// Exact post-field equality; an empty stored field map matches anything.
pub struct PostFieldsMatcher;

impl RequestMatcher for PostFieldsMatcher {
    fn matches(&self, stored: &Request, incoming: &Request) -> bool {
        stored.post_fields().is_empty() || stored.post_fields() == incoming.post_fields()
    }
}

/// Exact query-string equality; an absent stored query matches anything.
pub struct QueryStringMatcher;

impl RequestMatcher for QueryStringMatcher {
    fn matches(&self, stored: &Request, incoming: &Request) -> bool {
        match stored.query().filter(|q| !q.is_empty()) {
            None => true,
            Some(query) => incoming.query() == Some(query),
        }
    }
}

static SOAP_OPERATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<SOAP-ENV:Body><(.*?)>").expect("static pattern compiles"));

fn soap_operation(request: &Request) -> Option<String> {
    let body = request.body()?;
    SOAP_OPERATION
        .captures(body)
        .map(|caps| caps[1].to_string())
}

/// Compares the first element name inside `<SOAP-ENV:Body>`. Abstains
/// (matches) when the incoming request is not a SOAP envelope; a SOAP
/// incoming request never matches a non-SOAP stored one.
pub struct SoapOperationMatcher;

impl RequestMatcher for SoapOperationMatcher {
    fn matches(&self, stored: &Request, incoming: &Request) -> bool {
        let Some(incoming_operation) = soap_operation(incoming) else {
            return true;
        };
        match soap_operation(stored) {
            Some(stored_operation) => stored_operation == incoming_operation,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn request(method: &str, url: &str) -> Request {
        Request::new(method, url).unwrap()
    }

    fn soap_request(operation: &str) -> Request {
        let mut req = request("POST", "http://example.com/soap");
        req.set_body(format!(
            "<SOAP-ENV:Envelope><SOAP-ENV:Body><{operation}><x>1</x></{operation}></SOAP-ENV:Body></SOAP-ENV:Envelope>"
        ));
        req
    }

    #[test]
    fn method_matcher_honors_custom_method_override() {
        let mut stored = request("GET", "http://example.com/");
        stored.set_option(crate::http::CUSTOM_METHOD_OPTION, "DELETE".into());
        let incoming = request("DELETE", "http://example.com/");
        assert!(MethodMatcher.matches(&stored, &incoming));
        assert!(!MethodMatcher.matches(&stored, &request("GET", "http://example.com/")));
    }

    #[test]
    fn url_matcher_is_path_only_and_decodes() {
        let stored = request("GET", "http://example.com/a b");
        let incoming = request("GET", "http://other.example.com/a%20b?x=1");
        assert!(UrlMatcher.matches(&stored, &incoming));
        assert!(!UrlMatcher.matches(&stored, &request("GET", "http://example.com/c")));
    }

    #[test]
    fn host_matcher_is_case_insensitive() {
        let stored = request("GET", "http://Example.COM/");
        assert!(HostMatcher.matches(&stored, &request("GET", "http://example.com/")));
        assert!(!HostMatcher.matches(&stored, &request("GET", "http://example.org/")));
    }

    #[test]
    fn headers_matcher_treats_stored_headers_as_patterns() {
        let mut stored = request("GET", "http://example.com/");
        stored.set_header("Accept", "application/(json|xml)");
        let mut incoming = request("GET", "http://example.com/");
        incoming.set_header("Accept", "application/json");
        incoming.set_header("X-Extra", "ignored");
        assert!(HeadersMatcher.matches(&stored, &incoming));

        incoming.set_header("Accept", "text/html");
        assert!(!HeadersMatcher.matches(&stored, &incoming));
    }

    #[test]
    fn headers_matcher_requires_stored_headers_to_be_present() {
        let mut stored = request("GET", "http://example.com/");
        stored.set_header("Authorization", "Bearer .*");
        let incoming = request("GET", "http://example.com/");
        assert!(!HeadersMatcher.matches(&stored, &incoming));
    }

    #[test]
    fn empty_stored_header_value_matches() {
        let mut stored = request("GET", "http://example.com/");
        stored.set_header("X-Flag", "");
        let incoming = request("GET", "http://example.com/");
        assert!(HeadersMatcher.matches(&stored, &incoming));
    }

    #[test]
    fn body_matcher_treats_absent_stored_body_as_wildcard() {
        let stored = request("POST", "http://example.com/");
        let mut incoming = request("POST", "http://example.com/");
        incoming.set_body("anything");
        assert!(BodyMatcher.matches(&stored, &incoming));

        let mut stored = stored;
        stored.set_body("exact");
        assert!(!BodyMatcher.matches(&stored, &incoming));
        incoming.set_body("exact");
        assert!(BodyMatcher.matches(&stored, &incoming));
    }

    #[test]
    fn post_fields_matcher_compares_exactly() {
        let mut stored = request("POST", "http://example.com/");
        let mut fields = IndexMap::new();
        fields.insert("a".to_string(), "1".to_string());
        stored.set_post_fields(fields.clone());

        let mut incoming = request("POST", "http://example.com/");
        incoming.set_post_fields(fields);
        assert!(PostFieldsMatcher.matches(&stored, &incoming));

        incoming.set_post_field("a", "2");
        assert!(!PostFieldsMatcher.matches(&stored, &incoming));
    }

    #[test]
    fn query_string_matcher_compares_exactly() {
        let stored = request("GET", "http://example.com/?a=1&b=2");
        assert!(QueryStringMatcher.matches(&stored, &request("GET", "http://example.com/x?a=1&b=2")));
        assert!(!QueryStringMatcher.matches(&stored, &request("GET", "http://example.com/?a=1")));

        let wildcard = request("GET", "http://example.com/");
        assert!(QueryStringMatcher.matches(&wildcard, &request("GET", "http://example.com/?a=1")));
    }

    #[test]
    fn soap_matcher_abstains_for_non_soap_incoming() {
        let stored = soap_request("GetWeather");
        let incoming = request("POST", "http://example.com/soap");
        assert!(SoapOperationMatcher.matches(&stored, &incoming));
    }

    #[test]
    fn soap_matcher_compares_operation_names() {
        assert!(SoapOperationMatcher.matches(&soap_request("Foo"), &soap_request("Foo")));
        assert!(!SoapOperationMatcher.matches(&soap_request("Foo"), &soap_request("Bar")));
    }

    #[test]
    fn soap_incoming_never_matches_non_soap_stored() {
        let stored = request("POST", "http://example.com/soap");
        assert!(!SoapOperationMatcher.matches(&stored, &soap_request("Foo")));
    }
}
