//! Request matchers: pluggable predicates deciding whether a stored request
//! and an incoming request agree on one dimension.
//!
//! Matchers are looked up by name through a registry and composed into a
//! [`CompositeMatcher`] that requires every enabled dimension to agree.

mod builtin;

pub use builtin::{
    BodyMatcher, HeadersMatcher, HostMatcher, MethodMatcher, PostFieldsMatcher,
    QueryStringMatcher, SoapOperationMatcher, UrlMatcher,
};

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::http::Request;

/// A predicate comparing a stored request against an incoming one on a
/// single dimension.
pub trait RequestMatcher: Send + Sync {
    fn matches(&self, stored: &Request, incoming: &Request) -> bool;
}

type MatcherFactory = fn() -> Box<dyn RequestMatcher>;

/// Name-keyed matcher registry: enabling-by-name is a lookup, not
/// reflection.
static REGISTRY: Lazy<BTreeMap<&'static str, MatcherFactory>> = Lazy::new(|| {
    let mut map: BTreeMap<&'static str, MatcherFactory> = BTreeMap::new();
    map.insert("method", || Box::new(MethodMatcher));
    map.insert("url", || Box::new(UrlMatcher));
    map.insert("host", || Box::new(HostMatcher));
    map.insert("headers", || Box::new(HeadersMatcher));
    map.insert("body", || Box::new(BodyMatcher));
    map.insert("post_fields", || Box::new(PostFieldsMatcher));
    map.insert("query_string", || Box::new(QueryStringMatcher));
    map.insert("soap_operation", || Box::new(SoapOperationMatcher));
    map
});

/// All registered matcher names, in registry order.
pub fn available() -> Vec<&'static str> {
    REGISTRY.keys().copied().collect()
}

/// Instantiate a matcher by name.
pub fn create(name: &str) -> Result<Box<dyn RequestMatcher>> {
    if name.is_empty() {
        return Err(Error::EmptyMatcherName);
    }
    let factory = REGISTRY
        .get(name)
        .ok_or_else(|| Error::UnknownMatcher(name.to_string(), available().join(", ")))?;
    Ok(factory())
}

/// An ordered conjunction of named matchers. Order does not change the
/// boolean outcome but is preserved for future mismatch diagnostics.
pub struct CompositeMatcher {
    matchers: Vec<(String, Box<dyn RequestMatcher>)>,
}

impl CompositeMatcher {
    /// Build a composite from matcher names, resolved through the registry.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let mut matchers = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            matchers.push((name.to_string(), create(name)?));
        }
        Ok(Self { matchers })
    }

    /// Composite over every registered matcher, the default enabled set.
    pub fn all() -> Self {
        Self::from_names(&available()).expect("registry names are valid")
    }

    /// Names of the enabled matchers, in composition order.
    pub fn names(&self) -> Vec<&str> {
        self.matchers.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// True only if every constituent matcher agrees.
    pub fn matches(&self, stored: &Request, incoming: &Request) -> bool {
        self.matchers
            .iter()
            .all(|(_, matcher)| matcher.matches(stored, incoming))
    }
}
