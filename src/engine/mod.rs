//! Host engine interface.
//!
//! The dispatch layer never touches sockets or parses HTTP. An engine hands
//! it one [`Inbound`] per parsed request and two notifications per
//! connection; everything written back goes through the primitives below.
//!
//! # Data Flow
//! ```text
//! engine accepts socket      → Server::connection_opened(id, sink)
//! engine parses a request    → Server::dispatch(Inbound { id, head, transport })
//!     handler answers via Transport (status, headers, body | chunks | head)
//!     event streams keep writing via the connection's SocketSink
//! engine sees socket close   → Server::connection_closed(id)
//! ```
//!
//! # Design Decisions
//! - `Transport` is per request and owned by the request; `SocketSink` is
//!   per connection and outlives any one request
//! - Timeouts are a distinct error so callers can retry them
//! - Two engines ship: `memory` for tests and `net` (hyper) for serving

pub mod memory;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use thiserror::Error;

/// Global counter for engine-assigned connection IDs.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identity of a client connection, stable for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocate a fresh, process-unique ID.
    pub fn next() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap an ID the engine already tracks (a socket descriptor, say).
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Failures reported by engine primitives.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The send or receive timed out; retrying is allowed.
    #[error("transport timed out")]
    Timeout,

    #[error("connection closed")]
    Closed,

    #[error("transport failure: {0}")]
    Failure(#[from] std::io::Error),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout)
    }
}

/// Raw write access to a connection, independent of any request.
pub trait SocketSink: Send + Sync {
    /// Write raw bytes, returning how many were accepted.
    fn send(&self, bytes: &[u8]) -> Result<usize, TransportError>;

    /// Ask the engine to close the connection.
    fn close(&self) -> Result<(), TransportError>;
}

/// Per-request response primitives.
pub trait Transport: Send {
    /// Set the status line, e.g. `404 Not Found`.
    fn send_status(&mut self, line: &str) -> Result<(), TransportError>;

    fn set_header(&mut self, name: &str, value: &str) -> Result<(), TransportError>;

    /// Send a complete body; the response is done afterwards.
    fn send_body(&mut self, body: &[u8]) -> Result<(), TransportError>;

    /// Send one chunk. An empty chunk terminates the response.
    fn send_chunk(&mut self, chunk: &[u8]) -> Result<(), TransportError>;

    /// Send status and headers with no body framing; later bytes go through
    /// the connection's [`SocketSink`].
    fn send_head(&mut self) -> Result<(), TransportError>;

    /// Read request body bytes into `buf`. `Ok(0)` means nothing is left.
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Sink for the connection this request arrived on.
    fn socket(&self) -> Arc<dyn SocketSink>;
}

/// Parsed request line and headers.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    /// Path plus optional query, exactly as received.
    pub uri: String,
    pub headers: HeaderMap,
}

impl RequestHead {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: HeaderMap::new(),
        }
    }

    /// Append a header. Names or values that are not legal HTTP are skipped.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => tracing::warn!(header = name, "Skipping malformed request header"),
        }
        self
    }
}

/// One parsed request, as delivered by an engine.
pub struct Inbound {
    pub connection_id: ConnectionId,
    pub head: RequestHead,
    pub transport: Box<dyn Transport>,
}

impl Inbound {
    pub fn new(connection_id: ConnectionId, head: RequestHead, transport: Box<dyn Transport>) -> Self {
        Self {
            connection_id,
            head,
            transport,
        }
    }
}
