//! Connection handle.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::connection::session::Session;
use crate::engine::{ConnectionId, SocketSink, TransportError};

/// A live client connection.
///
/// Shared as `Arc<Connection>` between the registry, requests on the
/// connection, and every handler that has served it.
pub struct Connection {
    id: ConnectionId,
    sink: Arc<dyn SocketSink>,
    session: Mutex<Option<Session>>,
    closed: AtomicBool,
}

impl Connection {
    pub fn new(id: ConnectionId, sink: Arc<dyn SocketSink>) -> Self {
        Self {
            id,
            sink,
            session: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Write raw bytes to the socket, bypassing any request.
    pub fn send(&self, bytes: &[u8]) -> Result<usize, TransportError> {
        self.sink.send(bytes)
    }

    /// Ask the engine to close this connection.
    pub fn close(&self) -> Result<(), TransportError> {
        tracing::debug!(connection_id = %self.id, "Closing connection");
        self.sink.close()
    }

    /// Set once the engine has reported the socket closed. A closed
    /// connection never joins a handler's client set.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Returns false if the connection was already closed.
    pub(crate) fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }

    pub fn sink(&self) -> &Arc<dyn SocketSink> {
        &self.sink
    }

    pub fn has_session(&self) -> bool {
        self.session.lock().is_some()
    }

    pub fn session_get(&self, key: &str) -> Option<String> {
        self.session
            .lock()
            .as_ref()
            .and_then(|session| session.get(key))
            .map(str::to_owned)
    }

    /// Store a session value, creating the session if needed.
    pub fn session_set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.with_session(|session| {
            session.insert(key, value);
        });
    }

    pub fn session_remove(&self, key: &str) -> Option<String> {
        self.session
            .lock()
            .as_mut()
            .and_then(|session| session.remove(key))
    }

    /// Run `f` against the session under its lock, creating it if needed.
    /// `f` must not call back into this connection's session methods.
    pub fn with_session<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut guard = self.session.lock();
        f(guard.get_or_insert_with(Session::default))
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("has_session", &self.has_session())
            .finish()
    }
}
