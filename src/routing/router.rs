//! Endpoint and catch-all handler lookup.
//!
//! # Responsibilities
//! - Store endpoints and catch-all handlers in registration order
//! - Find the endpoint for a request head (first registered match wins)
//! - Pick a catch-all or fallback handler for unmatched requests
//!
//! # Design Decisions
//! - A matched endpoint is authoritative; its handler declining is the
//!   caller's concern, never a reason to keep searching
//! - Lookups clone `Arc`s out of the locks so handlers run unlocked
//! - Explicit `Resolution::NotFound` rather than a silent default

use std::sync::Arc;

use axum::http::Method;
use parking_lot::RwLock;

use crate::engine::RequestHead;
use crate::handler::{accepts, Handler};
use crate::http::Request;
use crate::routing::endpoint::Endpoint;

/// Where an unmatched or matched request ends up.
pub enum Resolution {
    Endpoint(Arc<Endpoint>),
    CatchAll(Arc<dyn Handler>),
    Fallback(Arc<dyn Handler>),
    NotFound,
}

impl Resolution {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Resolution::NotFound)
    }
}

impl std::fmt::Debug for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolution::Endpoint(endpoint) => f.debug_tuple("Endpoint").field(endpoint).finish(),
            Resolution::CatchAll(_) => f.write_str("CatchAll"),
            Resolution::Fallback(_) => f.write_str("Fallback"),
            Resolution::NotFound => f.write_str("NotFound"),
        }
    }
}

#[derive(Default)]
pub struct Router {
    endpoints: RwLock<Vec<Arc<Endpoint>>>,
    handlers: RwLock<Vec<Arc<dyn Handler>>>,
    fallback: RwLock<Option<Arc<dyn Handler>>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        method: Method,
        uri: impl Into<String>,
        handler: Option<Arc<dyn Handler>>,
    ) -> Arc<Endpoint> {
        let endpoint = Arc::new(Endpoint::new(method, uri, handler));
        tracing::debug!(method = %endpoint.method(), uri = %endpoint.uri(), "Endpoint registered");
        self.endpoints.write().push(Arc::clone(&endpoint));
        endpoint
    }

    pub fn endpoints(&self) -> Vec<Arc<Endpoint>> {
        self.endpoints.read().clone()
    }

    pub fn add_handler(&self, handler: Arc<dyn Handler>) {
        self.handlers.write().push(handler);
    }

    /// Remove a catch-all handler by identity.
    pub fn remove_handler(&self, handler: &Arc<dyn Handler>) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|h| !Arc::ptr_eq(h, handler));
        handlers.len() != before
    }

    pub fn handlers(&self) -> Vec<Arc<dyn Handler>> {
        self.handlers.read().clone()
    }

    pub fn set_fallback_handler(&self, handler: Option<Arc<dyn Handler>>) {
        *self.fallback.write() = handler;
    }

    pub fn fallback_handler(&self) -> Option<Arc<dyn Handler>> {
        self.fallback.read().clone()
    }

    pub fn match_endpoint(&self, head: &RequestHead) -> Option<Arc<Endpoint>> {
        self.endpoints
            .read()
            .iter()
            .find(|endpoint| endpoint.matches(head))
            .cloned()
    }

    /// First accepting catch-all, else the fallback handler.
    pub fn resolve_unmatched(&self, request: &Request) -> Resolution {
        let handlers = self.handlers();
        if let Some(handler) = handlers.into_iter().find(|h| accepts(h.as_ref(), request)) {
            return Resolution::CatchAll(handler);
        }
        match self.fallback_handler() {
            Some(handler) if accepts(handler.as_ref(), request) => Resolution::Fallback(handler),
            _ => Resolution::NotFound,
        }
    }

    pub fn resolve(&self, request: &Request) -> Resolution {
        match self.match_endpoint(request.head()) {
            Some(endpoint) => Resolution::Endpoint(endpoint),
            None => self.resolve_unmatched(request),
        }
    }

    /// Every distinct handler: endpoint handlers, catch-alls, then the
    /// fallback.
    pub fn every_handler(&self) -> Vec<Arc<dyn Handler>> {
        let mut all: Vec<Arc<dyn Handler>> = Vec::new();
        let candidates = self
            .endpoints()
            .into_iter()
            .filter_map(|endpoint| endpoint.handler())
            .chain(self.handlers())
            .chain(self.fallback_handler());
        for handler in candidates {
            if !all.iter().any(|seen| Arc::ptr_eq(seen, &handler)) {
                all.push(handler);
            }
        }
        all
    }

    /// Drop endpoints (with their handlers), then catch-alls, then the
    /// fallback. Returns the number of endpoints removed.
    pub fn clear(&self) -> usize {
        let endpoints = std::mem::take(&mut *self.endpoints.write());
        for endpoint in &endpoints {
            endpoint.clear_handler();
        }
        self.handlers.write().clear();
        self.fallback.write().take();
        endpoints.len()
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("endpoints", &self.endpoints.read().len())
            .field("handlers", &self.handlers.read().len())
            .field("has_fallback", &self.fallback.read().is_some())
            .finish()
    }
}
