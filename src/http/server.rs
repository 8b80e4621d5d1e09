//! Dispatch server.
//!
//! # Responsibilities
//! - Own the router, the connection registry and the worker pool
//! - Turn engine notifications (open, request, close) into handler calls
//! - Offload endpoint handlers to the pool when called on the engine thread
//! - Answer 503 / 500 / 404 when nothing can run the request
//!
//! # Design Decisions
//! - `dispatch` returns `Ok` whenever the client got an answer, including
//!   the 503/500/404 ones; `Err` means answering itself failed
//! - Authentication is checked after a handler is chosen, never before
//! - `stop` runs once: endpoints and handlers first, registry last

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use axum::http::Method;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::config::{DispatchConfig, Settings, WorkerConfig};
use crate::connection::{Connection, ConnectionRegistry};
use crate::engine::{ConnectionId, Inbound, SocketSink};
use crate::error::DispatchError;
use crate::handler::{accepts, ConnectionCallback, Handler, WebHandler};
use crate::http::request::Request;
use crate::http::response::ResponsePhase;
use crate::observability::metrics;
use crate::routing::{Endpoint, Resolution, Router};
use crate::status;
use crate::worker::{DispatchContext, Job, WorkerPool};

pub const BUSY_MESSAGE: &str = "No workers available. Server busy.";
pub const NO_HANDLER_MESSAGE: &str = "No handler registered.";
pub const NOT_FOUND_MESSAGE: &str = "That URI does not exist.";

/// How a dispatched request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Endpoint handler ran on the calling thread.
    Endpoint,
    /// Endpoint handler was queued on a worker.
    Offloaded,
    CatchAll,
    Fallback,
    NotFound,
    NoHandler,
    /// The endpoint's handler refused the request.
    Declined,
    AuthChallenge,
    /// No worker slot was free.
    Rejected,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Endpoint => "endpoint",
            Outcome::Offloaded => "offloaded",
            Outcome::CatchAll => "catch_all",
            Outcome::Fallback => "fallback",
            Outcome::NotFound => "not_found",
            Outcome::NoHandler => "no_handler",
            Outcome::Declined => "declined",
            Outcome::AuthChallenge => "auth_challenge",
            Outcome::Rejected => "rejected",
        }
    }
}

pub struct Server {
    router: Router,
    registry: ConnectionRegistry,
    settings: Arc<Settings>,
    worker_config: WorkerConfig,
    workers: OnceLock<WorkerPool>,
    on_open: RwLock<Option<ConnectionCallback>>,
    on_close: RwLock<Option<ConnectionCallback>>,
    stopped: AtomicBool,
}

impl Server {
    pub fn new(config: &DispatchConfig) -> Self {
        Self::with_settings(Settings::from_config(config), config.workers.clone())
    }

    pub fn with_settings(settings: Settings, worker_config: WorkerConfig) -> Self {
        let server = Self {
            router: Router::new(),
            registry: ConnectionRegistry::new(),
            settings: Arc::new(settings),
            worker_config,
            workers: OnceLock::new(),
            on_open: RwLock::new(None),
            on_close: RwLock::new(None),
            stopped: AtomicBool::new(false),
        };
        server.on_not_found(|request| {
            request.reply(status::NOT_FOUND, "text/plain", NOT_FOUND_MESSAGE)
        });
        server
    }

    /// Start the worker pool if enabled. Calling it again is a no-op.
    pub fn start(&self) -> std::io::Result<()> {
        if !self.worker_config.enabled || self.workers.get().is_some() {
            return Ok(());
        }
        let pool = WorkerPool::start(&self.worker_config)?;
        if self.workers.set(pool).is_err() {
            tracing::debug!("Worker pool already started");
        }
        Ok(())
    }

    /// Tear down endpoints, handlers and the registry. Returns false if
    /// the server was already stopped.
    pub fn stop(&self) -> bool {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return false;
        }
        let endpoints = self.router.clear();
        let connections = self.registry.len();
        self.registry.clear();
        tracing::info!(endpoints, connections, "Server stopped");
        true
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    // Registration

    /// GET endpoint with a callback-less web handler.
    pub fn on(&self, uri: &str) -> Arc<Endpoint> {
        self.on_method(uri, Method::GET)
    }

    pub fn on_method(&self, uri: &str, method: Method) -> Arc<Endpoint> {
        self.on_handler(uri, method, Arc::new(WebHandler::new()))
    }

    pub fn on_handler(&self, uri: &str, method: Method, handler: Arc<dyn Handler>) -> Arc<Endpoint> {
        self.router.register(method, uri, Some(handler))
    }

    pub fn on_fn(
        &self,
        uri: &str,
        method: Method,
        callback: impl Fn(&mut Request) -> Result<(), DispatchError> + Send + Sync + 'static,
    ) -> Arc<Endpoint> {
        self.on_handler(uri, method, Arc::new(WebHandler::with_callback(callback)))
    }

    /// Register a catch-all handler, consulted when no endpoint matches.
    pub fn add_handler(&self, handler: Arc<dyn Handler>) {
        self.router.add_handler(handler);
    }

    pub fn remove_handler(&self, handler: &Arc<dyn Handler>) -> bool {
        self.router.remove_handler(handler)
    }

    /// Replace the handler run when nothing else accepts a request.
    pub fn on_not_found(
        &self,
        callback: impl Fn(&mut Request) -> Result<(), DispatchError> + Send + Sync + 'static,
    ) {
        self.router
            .set_fallback_handler(Some(Arc::new(WebHandler::with_callback(callback))));
    }

    pub fn on_open(&self, callback: impl Fn(&Arc<Connection>) + Send + Sync + 'static) {
        *self.on_open.write() = Some(Arc::new(callback));
    }

    pub fn on_close(&self, callback: impl Fn(&Arc<Connection>) + Send + Sync + 'static) {
        *self.on_close.write() = Some(Arc::new(callback));
    }

    // Engine notifications

    /// The engine accepted a socket.
    pub fn connection_opened(&self, id: ConnectionId, sink: Arc<dyn SocketSink>) -> Arc<Connection> {
        let (connection, is_new) = self.registry.observe(id, || sink);
        if is_new {
            tracing::debug!(connection_id = %id, "Connection opened");
            self.fire_open(&connection);
        }
        connection
    }

    /// The engine saw a socket close. Handlers release the connection
    /// before the server-level close callback fires.
    pub fn connection_closed(&self, id: ConnectionId) -> bool {
        let Some(connection) = self.registry.get(id) else {
            return false;
        };
        if !connection.mark_closed() {
            return false;
        }

        let released = self
            .router
            .every_handler()
            .iter()
            .filter(|handler| handler.release_connection(&connection))
            .count();

        let on_close = self.on_close.read().clone();
        if let Some(on_close) = on_close {
            on_close(&connection);
        }

        self.registry.remove(id);
        if let Err(error) = connection.close() {
            tracing::debug!(connection_id = %id, error = %error, "Socket close failed");
        }
        tracing::debug!(connection_id = %id, released, "Connection closed");
        true
    }

    /// Route one request from the engine thread.
    pub fn dispatch(&self, inbound: Inbound) -> Result<Outcome, DispatchError> {
        self.dispatch_in(inbound, DispatchContext::engine())
    }

    /// Route one request, stating which thread it is running on. Requests
    /// already on a worker never go back to the pool.
    pub fn dispatch_in(
        &self,
        inbound: Inbound,
        context: DispatchContext,
    ) -> Result<Outcome, DispatchError> {
        let Inbound {
            connection_id,
            head,
            transport,
        } = inbound;

        let span = tracing::debug_span!(
            "dispatch",
            request_id = %Uuid::new_v4(),
            connection_id = %connection_id
        );
        let _entered = span.enter();

        let sink = transport.socket();
        let (connection, is_new) = self.registry.observe(connection_id, || sink);
        if is_new {
            self.fire_open(&connection);
        }

        let mut request = Request::new(head, connection, transport, Arc::clone(&self.settings));
        request.set_context(context);
        tracing::debug!(method = %request.method(), uri = %request.uri(), "Dispatching request");

        let result = match self.router.resolve(&request) {
            Resolution::Endpoint(endpoint) => self.dispatch_endpoint(endpoint, request),
            Resolution::CatchAll(handler) => {
                run_handler(handler.as_ref(), &mut request, Outcome::CatchAll)
            }
            Resolution::Fallback(handler) => {
                tracing::debug!(uri = %request.uri(), "No route matched, running fallback");
                run_handler(handler.as_ref(), &mut request, Outcome::Fallback)
            }
            Resolution::NotFound => {
                tracing::debug!(uri = %request.uri(), "No route matched");
                request.response().send_status(status::NOT_FOUND)?;
                Ok(Outcome::NotFound)
            }
        };

        record(&result);
        result
    }

    fn dispatch_endpoint(
        &self,
        endpoint: Arc<Endpoint>,
        mut request: Request,
    ) -> Result<Outcome, DispatchError> {
        let pool = match self.workers.get() {
            Some(pool) if !request.context().is_worker() => pool,
            _ => return execute_endpoint(&endpoint, &mut request),
        };

        let job = EndpointJob {
            endpoint,
            request,
            span: tracing::Span::current(),
        };
        match pool.submit(job) {
            Ok(()) => Ok(Outcome::Offloaded),
            Err(rejected) => {
                let mut request = rejected.into_job().request;
                let code = DispatchError::AdmissionRejected.status().as_u16();
                request.reply(code, "text/plain", BUSY_MESSAGE)?;
                Ok(Outcome::Rejected)
            }
        }
    }

    fn fire_open(&self, connection: &Arc<Connection>) {
        let on_open = self.on_open.read().clone();
        if let Some(on_open) = on_open {
            on_open(connection);
        }
    }

    // Accessors

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Live connection count.
    pub fn count(&self) -> usize {
        self.registry.len()
    }

    pub fn connection(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.registry.get(id)
    }

    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.registry.snapshot()
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    pub fn workers(&self) -> Option<&WorkerPool> {
        self.workers.get()
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("router", &self.router)
            .field("connections", &self.registry.len())
            .field("workers", &self.workers.get())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// An endpoint request queued on a worker.
struct EndpointJob {
    endpoint: Arc<Endpoint>,
    request: Request,
    span: tracing::Span,
}

impl Job for EndpointJob {
    fn run(self: Box<Self>, context: DispatchContext) {
        let EndpointJob {
            endpoint,
            mut request,
            span,
        } = *self;
        let _entered = span.enter();

        request.set_context(context);
        tracing::trace!(worker = ?context.worker_index(), "Running offloaded request");
        let result = execute_endpoint(&endpoint, &mut request);
        record(&result);
    }
}

/// Run a matched endpoint's handler. A missing or declining handler is
/// answered with 500; the request is never re-routed.
fn execute_endpoint(endpoint: &Endpoint, request: &mut Request) -> Result<Outcome, DispatchError> {
    let Some(handler) = endpoint.handler() else {
        tracing::error!(
            method = %endpoint.method(),
            uri = %endpoint.uri(),
            "Endpoint has no handler"
        );
        let code = DispatchError::NoHandler.status().as_u16();
        request.reply(code, "text/plain", NO_HANDLER_MESSAGE)?;
        return Ok(Outcome::NoHandler);
    };

    if !accepts(handler.as_ref(), request) {
        tracing::warn!(uri = %request.uri(), "Endpoint handler declined request");
        request.response().send_status(status::INTERNAL_SERVER_ERROR)?;
        return Ok(Outcome::Declined);
    }

    run_handler(handler.as_ref(), request, Outcome::Endpoint)
}

/// Authentication gate, then the handler. A handler error with nothing
/// sent yet is answered with the error's status.
fn run_handler(
    handler: &dyn Handler,
    request: &mut Request,
    outcome: Outcome,
) -> Result<Outcome, DispatchError> {
    if handler.core().needs_authentication(request) {
        tracing::info!(uri = %request.uri(), "Authentication required, sending challenge");
        handler.core().authenticate(request)?;
        return Ok(Outcome::AuthChallenge);
    }

    match handler.handle(request) {
        Ok(()) => Ok(outcome),
        Err(error) => {
            if !error.is_transport() && request.response_phase() == ResponsePhase::Pending {
                request.response().send_status(error.status().as_u16())?;
            }
            Err(error)
        }
    }
}

fn record(result: &Result<Outcome, DispatchError>) {
    match result {
        Ok(outcome) => metrics::record_request(outcome.as_str()),
        Err(error) if error.is_transport() => {
            metrics::record_request("error");
            tracing::error!(error = %error, "Transport failure while answering request");
        }
        Err(error) => {
            metrics::record_request("error");
            tracing::warn!(error = %error, "Handler failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credentials;
    use crate::engine::memory::{MemorySocket, MemoryTransport, Recording};
    use crate::engine::RequestHead;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    fn server() -> Server {
        let config = DispatchConfig {
            workers: WorkerConfig {
                enabled: false,
                ..WorkerConfig::default()
            },
            ..DispatchConfig::default()
        };
        Server::new(&config)
    }

    fn send(server: &Server, id: ConnectionId, head: RequestHead) -> (Outcome, Arc<Mutex<Recording>>) {
        let (transport, recording) = MemoryTransport::new(MemorySocket::new());
        let outcome = server
            .dispatch(Inbound::new(id, head, Box::new(transport)))
            .unwrap();
        (outcome, recording)
    }

    #[test]
    fn test_endpoints_do_not_cross() {
        let server = server();
        let a_calls = Arc::new(AtomicUsize::new(0));
        let b_calls = Arc::new(AtomicUsize::new(0));
        let a = Arc::clone(&a_calls);
        server.on_fn("/a", Method::GET, move |request| {
            a.fetch_add(1, Ordering::SeqCst);
            request.reply(200, "text/plain", "a")
        });
        let b = Arc::clone(&b_calls);
        server.on_fn("/b", Method::GET, move |request| {
            b.fetch_add(1, Ordering::SeqCst);
            request.reply(200, "text/plain", "b")
        });

        let (outcome, recording) = send(&server, ConnectionId::next(), RequestHead::new(Method::GET, "/a"));
        assert_eq!(outcome, Outcome::Endpoint);
        assert_eq!(recording.lock().text(), "a");
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_endpoint_answers_500() {
        let server = server();
        server.router().register(Method::GET, "/void", None);

        let (outcome, recording) =
            send(&server, ConnectionId::next(), RequestHead::new(Method::GET, "/void"));
        assert_eq!(outcome, Outcome::NoHandler);
        let recording = recording.lock();
        assert_eq!(recording.status_code(), Some(500));
        assert_eq!(recording.text(), NO_HANDLER_MESSAGE);
    }

    #[test]
    fn test_declining_endpoint_is_not_rerouted() {
        let server = server();
        let endpoint = server.on_fn("/guarded", Method::GET, |request| {
            request.reply(200, "text/plain", "inside")
        });
        endpoint.set_filter(|request| request.has_header("x-allowed"));
        let fallback_hits = Arc::new(AtomicUsize::new(0));
        let hits = Arc::clone(&fallback_hits);
        server.add_handler(Arc::new(WebHandler::with_callback(move |request| {
            hits.fetch_add(1, Ordering::SeqCst);
            request.reply(200, "text/plain", "catch-all")
        })));

        let (outcome, recording) =
            send(&server, ConnectionId::next(), RequestHead::new(Method::GET, "/guarded"));
        assert_eq!(outcome, Outcome::Declined);
        assert_eq!(recording.lock().status_code(), Some(500));
        assert_eq!(fallback_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_default_not_found() {
        let server = server();
        let (outcome, recording) =
            send(&server, ConnectionId::next(), RequestHead::new(Method::GET, "/missing"));
        assert_eq!(outcome, Outcome::Fallback);
        let recording = recording.lock();
        assert_eq!(recording.status_code(), Some(404));
        assert_eq!(recording.text(), NOT_FOUND_MESSAGE);
    }

    #[test]
    fn test_auth_challenge_short_circuits() {
        let server = server();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        server
            .on_fn("/admin", Method::GET, move |request| {
                c.fetch_add(1, Ordering::SeqCst);
                request.reply(200, "text/plain", "ok")
            })
            .set_authentication(Credentials::basic("admin", "secret").with_realm("lab"));

        let (outcome, recording) =
            send(&server, ConnectionId::next(), RequestHead::new(Method::GET, "/admin"));
        assert_eq!(outcome, Outcome::AuthChallenge);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let recording = recording.lock();
        assert_eq!(recording.status_code(), Some(401));
        assert_eq!(recording.header("WWW-Authenticate"), Some("Basic realm=\"lab\""));
    }

    #[test]
    fn test_close_releases_handlers_before_server_callback() {
        let server = server();
        let order = Arc::new(Mutex::new(Vec::new()));
        let handler = Arc::new(WebHandler::with_callback(|request| request.reply(200, "text/plain", "")));
        let o = Arc::clone(&order);
        handler.on_close(move |_| o.lock().push("handler"));
        server.on_handler("/", Method::GET, handler);
        let o = Arc::clone(&order);
        server.on_close(move |_| o.lock().push("server"));

        let id = ConnectionId::next();
        send(&server, id, RequestHead::new(Method::GET, "/"));
        assert_eq!(server.count(), 1);

        assert!(server.connection_closed(id));
        assert!(!server.connection_closed(id));
        assert_eq!(*order.lock(), vec!["handler", "server"]);
        assert_eq!(server.count(), 0);
    }

    #[test]
    fn test_stop_runs_once() {
        let server = server();
        server.on("/");
        server.connection_opened(ConnectionId::next(), MemorySocket::new());
        assert!(server.stop());
        assert!(!server.stop());
        assert_eq!(server.count(), 0);
        assert!(server.router().endpoints().is_empty());
    }
}
