//! Route matching logic.
//!
//! # Responsibilities
//! - Match the request method (exact)
//! - Match the request path against a URI template with wildcards
//! - Combine conditions with AND semantics
//!
//! # Template Syntax
//! - `/path` matches exactly `/path`
//! - `/path/*` matches `/path/` followed by anything
//! - `/path/?` matches `/path` and `/path/` (the character before `?` is
//!   optional)
//! - `/path/?*` matches `/path`, `/path/` and `/path/...`
//!
//! The query string never takes part in matching. Paths are case-sensitive.

use std::fmt;

use axum::http::Method;

use crate::engine::RequestHead;

/// Trait for matching request heads against conditions.
pub trait Matcher: Send + Sync + fmt::Debug {
    fn matches(&self, head: &RequestHead) -> bool;
}

/// Matches the request method.
#[derive(Debug, Clone)]
pub struct MethodMatcher {
    method: Method,
}

impl MethodMatcher {
    pub fn new(method: Method) -> Self {
        Self { method }
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, head: &RequestHead) -> bool {
        head.method == self.method
    }
}

/// Matches the path against a wildcard URI template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriPattern {
    template: String,
    /// Template with `?`/`*` stripped and without its optional character.
    base: String,
    optional: Option<char>,
    prefix: bool,
}

impl UriPattern {
    pub fn new(template: impl Into<String>) -> Self {
        let template = template.into();
        let mut rest = template.as_str();

        let prefix = rest.ends_with('*');
        if prefix {
            rest = &rest[..rest.len() - 1];
        }

        let mut optional = None;
        if let Some(stripped) = rest.strip_suffix('?') {
            rest = stripped;
            if let Some(last) = rest.chars().last() {
                optional = Some(last);
                rest = &rest[..rest.len() - last.len_utf8()];
            }
        }

        Self {
            base: rest.to_string(),
            optional,
            prefix,
            template,
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Match a path, ignoring anything after `?`.
    pub fn matches_uri(&self, uri: &str) -> bool {
        let path = uri.split_once('?').map_or(uri, |(path, _)| path);

        let Some(after_base) = path.strip_prefix(self.base.as_str()) else {
            return false;
        };

        match (self.optional, self.prefix) {
            (None, false) => after_base.is_empty(),
            (None, true) => true,
            (Some(optional), false) => {
                after_base.is_empty() || after_base.strip_prefix(optional) == Some("")
            }
            (Some(optional), true) => {
                after_base.is_empty() || after_base.starts_with(optional)
            }
        }
    }
}

impl Matcher for UriPattern {
    fn matches(&self, head: &RequestHead) -> bool {
        self.matches_uri(&head.uri)
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, head: &RequestHead) -> bool {
        self.matchers.iter().all(|m| m.matches(head))
    }
}
