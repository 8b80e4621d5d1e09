//! Request handlers.
//!
//! # Data Flow
//! ```text
//! router picks a handler
//!     → HandlerCore::filter(request) && Handler::can_handle(request)
//!     → HandlerCore::needs_authentication(request)?
//!         yes → HandlerCore::authenticate (401 challenge)
//!         no  → Handler::handle(request)
//!
//! connection closed
//!     → Handler::release_connection (close callback, client entry dropped)
//! ```
//!
//! # Design Decisions
//! - Filter and credentials are shared behaviour, held in `HandlerCore`
//!   and reached through `Handler::core`
//! - Handlers keep their own `ClientSet`; the connection knows nothing
//!   about which handlers served it
//! - Callbacks are cloned out of their lock before being called

pub mod event_source;
pub mod web;

use std::sync::Arc;

use parking_lot::RwLock;

use crate::auth::Credentials;
use crate::connection::Connection;
use crate::error::DispatchError;
use crate::http::Request;

pub use event_source::{EventSource, EventSourceClient};
pub use web::WebHandler;

/// Extra predicate a handler's request must satisfy.
pub type RequestFilter = Arc<dyn Fn(&Request) -> bool + Send + Sync>;

/// Application request callback.
pub type RequestCallback = Arc<dyn Fn(&mut Request) -> Result<(), DispatchError> + Send + Sync>;

/// Connection lifecycle callback.
pub type ConnectionCallback = Arc<dyn Fn(&Arc<Connection>) + Send + Sync>;

/// Something the router can hand a request to.
pub trait Handler: Send + Sync {
    fn core(&self) -> &HandlerCore;

    /// Handler-specific acceptance check, run after the filter.
    fn can_handle(&self, _request: &Request) -> bool {
        true
    }

    fn handle(&self, request: &mut Request) -> Result<(), DispatchError>;

    /// Forget `connection`, firing any close callback. Returns true if
    /// this handler had served it.
    fn release_connection(&self, _connection: &Arc<Connection>) -> bool {
        false
    }

    /// Connections this handler currently tracks.
    fn client_count(&self) -> usize {
        0
    }
}

/// Filter and credentials shared by every handler.
#[derive(Default)]
pub struct HandlerCore {
    filter: RwLock<Option<RequestFilter>>,
    credentials: RwLock<Option<Credentials>>,
}

impl HandlerCore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_filter(&self, filter: impl Fn(&Request) -> bool + Send + Sync + 'static) {
        *self.filter.write() = Some(Arc::new(filter));
    }

    pub fn clear_filter(&self) {
        *self.filter.write() = None;
    }

    /// True when no filter is set or the filter accepts.
    pub fn filter(&self, request: &Request) -> bool {
        let filter = self.filter.read().clone();
        filter.map_or(true, |filter| filter(request))
    }

    pub fn set_authentication(&self, credentials: Credentials) {
        *self.credentials.write() = Some(credentials);
    }

    pub fn clear_authentication(&self) {
        *self.credentials.write() = None;
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.credentials.read().clone()
    }

    /// Credentials are configured and the request does not satisfy them.
    pub fn needs_authentication(&self, request: &Request) -> bool {
        match self.credentials() {
            Some(credentials) if credentials.is_configured() => !credentials.verify(request),
            _ => false,
        }
    }

    /// Send the 401 challenge for the configured scheme.
    pub fn authenticate(&self, request: &mut Request) -> Result<(), DispatchError> {
        self.credentials().unwrap_or_default().challenge(request)
    }
}

impl std::fmt::Debug for HandlerCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerCore")
            .field("has_filter", &self.filter.read().is_some())
            .field("credentials", &*self.credentials.read())
            .finish()
    }
}

/// True when `handler` both passes its filter and accepts the request.
pub fn accepts(handler: &dyn Handler, request: &Request) -> bool {
    handler.core().filter(request) && handler.can_handle(request)
}
