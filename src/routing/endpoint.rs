//! A registered (method, URI pattern) binding.

use std::fmt;
use std::sync::Arc;

use axum::http::Method;
use parking_lot::RwLock;

use crate::auth::Credentials;
use crate::engine::RequestHead;
use crate::handler::Handler;
use crate::http::Request;
use crate::routing::matcher::{AndMatcher, Matcher, MethodMatcher, UriPattern};

/// Binds a method and URI pattern to one handler.
///
/// The handler slot may be empty; a request routed to an empty endpoint is
/// answered with 500.
pub struct Endpoint {
    method: Method,
    pattern: UriPattern,
    matcher: AndMatcher,
    handler: RwLock<Option<Arc<dyn Handler>>>,
}

impl Endpoint {
    pub fn new(method: Method, uri: impl Into<String>, handler: Option<Arc<dyn Handler>>) -> Self {
        let pattern = UriPattern::new(uri);
        let matcher = AndMatcher::new(vec![
            Box::new(MethodMatcher::new(method.clone())),
            Box::new(pattern.clone()),
        ]);
        Self {
            method,
            pattern,
            matcher,
            handler: RwLock::new(handler),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &str {
        self.pattern.template()
    }

    pub fn matches(&self, head: &RequestHead) -> bool {
        self.matcher.matches(head)
    }

    pub fn handler(&self) -> Option<Arc<dyn Handler>> {
        self.handler.read().clone()
    }

    pub fn set_handler(&self, handler: Arc<dyn Handler>) -> &Self {
        *self.handler.write() = Some(handler);
        self
    }

    /// Detach the handler, returning it.
    pub fn clear_handler(&self) -> Option<Arc<dyn Handler>> {
        self.handler.write().take()
    }

    /// Forwarded to the handler; a no-op on an empty endpoint.
    pub fn set_filter(&self, filter: impl Fn(&Request) -> bool + Send + Sync + 'static) -> &Self {
        if let Some(handler) = self.handler() {
            handler.core().set_filter(filter);
        }
        self
    }

    /// Forwarded to the handler; a no-op on an empty endpoint.
    pub fn set_authentication(&self, credentials: Credentials) -> &Self {
        if let Some(handler) = self.handler() {
            handler.core().set_authentication(credentials);
        }
        self
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("method", &self.method)
            .field("uri", &self.pattern.template())
            .field("has_handler", &self.handler.read().is_some())
            .finish()
    }
}
