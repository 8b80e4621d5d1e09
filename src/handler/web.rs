//! General-purpose request/response handler.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::connection::{ClientSet, Connection};
use crate::error::DispatchError;
use crate::handler::{ConnectionCallback, Handler, HandlerCore, RequestCallback};
use crate::http::Request;
use crate::status;

/// Loads body and parameters, then runs the application callback.
///
/// Tracks every connection it has served so open and close callbacks fire
/// once per connection.
#[derive(Default)]
pub struct WebHandler {
    core: HandlerCore,
    callback: RwLock<Option<RequestCallback>>,
    on_open: RwLock<Option<ConnectionCallback>>,
    on_close: RwLock<Option<ConnectionCallback>>,
    clients: ClientSet<()>,
}

impl WebHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(
        callback: impl Fn(&mut Request) -> Result<(), DispatchError> + Send + Sync + 'static,
    ) -> Self {
        let handler = Self::new();
        handler.on_request(callback);
        handler
    }

    pub fn on_request(
        &self,
        callback: impl Fn(&mut Request) -> Result<(), DispatchError> + Send + Sync + 'static,
    ) -> &Self {
        *self.callback.write() = Some(Arc::new(callback));
        self
    }

    pub fn on_open(&self, callback: impl Fn(&Arc<Connection>) + Send + Sync + 'static) -> &Self {
        *self.on_open.write() = Some(Arc::new(callback));
        self
    }

    pub fn on_close(&self, callback: impl Fn(&Arc<Connection>) + Send + Sync + 'static) -> &Self {
        *self.on_close.write() = Some(Arc::new(callback));
        self
    }

    pub fn clients(&self) -> &ClientSet<()> {
        &self.clients
    }
}

impl Handler for WebHandler {
    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn handle(&self, request: &mut Request) -> Result<(), DispatchError> {
        match self.clients.check_for_new(request.connection(), |_| ()) {
            Some(checked) if checked.is_new => {
                tracing::debug!(connection_id = %request.connection_id(), "New web client");
                let on_open = self.on_open.read().clone();
                if let Some(on_open) = on_open {
                    on_open(&checked.entry.connection);
                }
            }
            Some(_) => {}
            None => tracing::debug!(
                connection_id = %request.connection_id(),
                "Connection closed before its request ran"
            ),
        }

        let limit = request.settings().limits.max_request_body_size;
        let declared = request.content_length();
        if declared > limit {
            tracing::warn!(declared, limit, uri = %request.uri(), "Request body too large");
            request.reply(
                status::BAD_REQUEST,
                "text/html",
                format!("Request body must be less than {limit} bytes!"),
            )?;
            return Err(DispatchError::BodyTooLarge {
                limit,
                actual: declared,
            });
        }

        request.load_body()?;
        request.load_params();

        let callback = self.callback.read().clone();
        match callback {
            Some(callback) => callback(request),
            None => Ok(()),
        }
    }

    fn release_connection(&self, connection: &Arc<Connection>) -> bool {
        if !self.clients.contains(connection.id()) {
            return false;
        }
        let on_close = self.on_close.read().clone();
        if let Some(on_close) = on_close {
            on_close(connection);
        }
        self.clients.remove(connection.id());
        true
    }

    fn client_count(&self) -> usize {
        self.clients.len()
    }
}
