//! Server-sent events handler.
//!
//! # Responsibilities
//! - Answer the handshake with an event-stream head
//! - Track one `EventSourceClient` per connection
//! - Broadcast frames to every client, or send to one
//!
//! # Design Decisions
//! - Frames go straight to the connection's sink, not through a request
//! - A send that times out is retried; a hard failure is logged and the
//!   client stays registered until its connection closes
//! - `Last-Event-ID` seeds the client's last id before the open callback

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::connection::{ClientEntry, ClientSet, Connection};
use crate::engine::{ConnectionId, TransportError};
use crate::error::DispatchError;
use crate::handler::{Handler, HandlerCore};
use crate::http::Request;
use crate::observability::metrics;
use crate::stream::{format_event, retry_on_timeout};

pub type ClientCallback = Arc<dyn Fn(&EventSourceClient) + Send + Sync>;

/// One subscribed connection.
pub struct EventSourceClient {
    connection: Arc<Connection>,
    last_id: AtomicU32,
    max_retries: Option<u32>,
}

impl EventSourceClient {
    pub fn new(connection: Arc<Connection>, max_retries: Option<u32>) -> Self {
        Self {
            connection,
            last_id: AtomicU32::new(0),
            max_retries,
        }
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub fn id(&self) -> ConnectionId {
        self.connection.id()
    }

    /// Last event id the client reported, or 0.
    pub fn last_id(&self) -> u32 {
        self.last_id.load(Ordering::SeqCst)
    }

    pub fn set_last_id(&self, id: u32) {
        self.last_id.store(id, Ordering::SeqCst);
    }

    /// Format and send one event to this client.
    pub fn send(
        &self,
        message: Option<&str>,
        event: Option<&str>,
        id: u32,
        reconnect: u32,
    ) -> Result<(), TransportError> {
        self.send_raw(format_event(message, event, id, reconnect).as_bytes())
    }

    /// Send a pre-formatted frame, retrying on timeout.
    pub fn send_raw(&self, frame: &[u8]) -> Result<(), TransportError> {
        retry_on_timeout(self.max_retries, || self.connection.send(frame)).map(|_| ())
    }

    pub fn close(&self) -> Result<(), TransportError> {
        self.connection.close()
    }
}

#[derive(Default)]
pub struct EventSource {
    core: HandlerCore,
    clients: ClientSet<EventSourceClient>,
    on_open: RwLock<Option<ClientCallback>>,
    on_close: RwLock<Option<ClientCallback>>,
}

impl EventSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_open(&self, callback: impl Fn(&EventSourceClient) + Send + Sync + 'static) -> &Self {
        *self.on_open.write() = Some(Arc::new(callback));
        self
    }

    pub fn on_close(&self, callback: impl Fn(&EventSourceClient) + Send + Sync + 'static) -> &Self {
        *self.on_close.write() = Some(Arc::new(callback));
        self
    }

    /// Broadcast one event to every client. Returns how many received it.
    pub fn send(&self, message: &str, event: Option<&str>, id: u32, reconnect: u32) -> usize {
        let frame = format_event(Some(message), event, id, reconnect);
        let mut delivered = 0;
        for entry in self.clients.snapshot() {
            match entry.state.send_raw(frame.as_bytes()) {
                Ok(()) => delivered += 1,
                Err(error) => tracing::warn!(
                    connection_id = %entry.connection.id(),
                    error = %error,
                    "Event send failed"
                ),
            }
        }
        tracing::trace!(delivered, event = ?event, id, "Event broadcast");
        delivered
    }

    pub fn client(&self, id: ConnectionId) -> Option<Arc<EventSourceClient>> {
        self.clients.get(id).map(|entry| entry.state)
    }

    pub fn clients(&self) -> Vec<Arc<EventSourceClient>> {
        self.clients
            .snapshot()
            .into_iter()
            .map(|entry| entry.state)
            .collect()
    }

    pub fn count(&self) -> usize {
        self.clients.len()
    }
}

impl Handler for EventSource {
    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn handle(&self, request: &mut Request) -> Result<(), DispatchError> {
        request.response().open_event_stream()?;

        let max_retries = request.settings().stream.max_send_retries;
        let Some(checked) = self.clients.check_for_new(request.connection(), |connection| {
            EventSourceClient::new(Arc::clone(connection), max_retries)
        }) else {
            tracing::debug!(
                connection_id = %request.connection_id(),
                "Connection closed before the event stream opened"
            );
            return Ok(());
        };
        if !checked.is_new {
            return Ok(());
        }

        let client = &checked.entry.state;
        if let Some(last) = request.header("last-event-id") {
            client.set_last_id(last.trim().parse().unwrap_or(0));
        }
        tracing::debug!(
            connection_id = %client.id(),
            last_id = client.last_id(),
            "Event stream client connected"
        );
        metrics::set_event_stream_clients(self.clients.len());

        let on_open = self.on_open.read().clone();
        if let Some(on_open) = on_open {
            on_open(client);
        }
        Ok(())
    }

    fn release_connection(&self, connection: &Arc<Connection>) -> bool {
        let Some(ClientEntry { state, .. }) = self.clients.get(connection.id()) else {
            return false;
        };
        let on_close = self.on_close.read().clone();
        if let Some(on_close) = on_close {
            on_close(&state);
        }
        self.clients.remove(connection.id());
        metrics::set_event_stream_clients(self.clients.len());
        tracing::debug!(connection_id = %connection.id(), "Event stream client disconnected");
        true
    }

    fn client_count(&self) -> usize {
        self.clients.len()
    }
}
