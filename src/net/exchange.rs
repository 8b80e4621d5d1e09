//! Engine primitives over a hyper exchange.
//!
//! # Responsibilities
//! - `HyperTransport`: turn status/header/body/chunk calls into one
//!   `http::Response`, delivered to the connection task through a oneshot
//! - `HyperSocket`: raw writes on a connection after `send_head`, which is
//!   how event streams keep talking once their request is done
//!
//! # Design Decisions
//! - A full body goes out as one buffer; chunks and raw writes go through
//!   an unbounded channel feeding a streaming body
//! - A transport dropped without answering sends 500

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Response, StatusCode};
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, Notify};

use crate::engine::{SocketSink, Transport, TransportError};

type BodySender = mpsc::UnboundedSender<Bytes>;

fn streaming_body(rx: mpsc::UnboundedReceiver<Bytes>) -> Body {
    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|bytes| (Ok::<_, std::io::Error>(bytes), rx))
    });
    Body::from_stream(stream)
}

fn invalid(message: impl Into<String>) -> TransportError {
    TransportError::Failure(std::io::Error::new(
        std::io::ErrorKind::InvalidInput,
        message.into(),
    ))
}

/// Write side of one hyper connection.
#[derive(Debug, Default)]
pub struct HyperSocket {
    stream: Mutex<Option<BodySender>>,
    closed: Notify,
}

impl HyperSocket {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Route raw sends into the body of the response that just sent its
    /// head.
    fn attach(&self, sender: BodySender) {
        *self.stream.lock() = Some(sender);
    }

    /// Resolves once `close` has been called.
    pub async fn closed(&self) {
        self.closed.notified().await;
    }
}

impl SocketSink for HyperSocket {
    fn send(&self, bytes: &[u8]) -> Result<usize, TransportError> {
        let guard = self.stream.lock();
        let Some(sender) = guard.as_ref() else {
            return Err(TransportError::Closed);
        };
        sender
            .send(Bytes::copy_from_slice(bytes))
            .map_err(|_| TransportError::Closed)?;
        Ok(bytes.len())
    }

    fn close(&self) -> Result<(), TransportError> {
        self.stream.lock().take();
        self.closed.notify_one();
        Ok(())
    }
}

/// One request/response exchange on a hyper connection.
pub struct HyperTransport {
    socket: Arc<HyperSocket>,
    status: StatusCode,
    headers: Vec<(HeaderName, HeaderValue)>,
    responder: Option<oneshot::Sender<Response<Body>>>,
    chunks: Option<BodySender>,
    body: Bytes,
}

impl HyperTransport {
    pub fn new(
        socket: Arc<HyperSocket>,
        body: Bytes,
        responder: oneshot::Sender<Response<Body>>,
    ) -> Self {
        Self {
            socket,
            status: StatusCode::OK,
            headers: Vec::new(),
            responder: Some(responder),
            chunks: None,
            body,
        }
    }

    fn respond(&mut self, body: Body) -> Result<(), TransportError> {
        let responder = self.responder.take().ok_or(TransportError::Closed)?;
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        let headers = response.headers_mut();
        for (name, value) in self.headers.drain(..) {
            headers.append(name, value);
        }
        responder.send(response).map_err(|_| TransportError::Closed)
    }

    fn open_stream(&mut self) -> Result<BodySender, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.respond(streaming_body(rx))?;
        Ok(tx)
    }
}

impl Transport for HyperTransport {
    fn send_status(&mut self, line: &str) -> Result<(), TransportError> {
        let code = line.split_whitespace().next().unwrap_or_default();
        self.status = code
            .parse::<u16>()
            .ok()
            .and_then(|code| StatusCode::from_u16(code).ok())
            .ok_or_else(|| invalid(format!("bad status line {line:?}")))?;
        Ok(())
    }

    fn set_header(&mut self, name: &str, value: &str) -> Result<(), TransportError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| invalid(format!("bad header name {name:?}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| invalid(format!("bad value for header {name}")))?;
        self.headers.push((name, value));
        Ok(())
    }

    fn send_body(&mut self, body: &[u8]) -> Result<(), TransportError> {
        self.respond(Body::from(Bytes::copy_from_slice(body)))
    }

    fn send_chunk(&mut self, chunk: &[u8]) -> Result<(), TransportError> {
        if chunk.is_empty() {
            if self.chunks.take().is_none() && self.responder.is_some() {
                self.respond(Body::empty())?;
            }
            return Ok(());
        }
        if self.chunks.is_none() {
            self.chunks = Some(self.open_stream()?);
        }
        let sender = self.chunks.as_ref().ok_or(TransportError::Closed)?;
        sender
            .send(Bytes::copy_from_slice(chunk))
            .map_err(|_| TransportError::Closed)
    }

    fn send_head(&mut self) -> Result<(), TransportError> {
        let sender = self.open_stream()?;
        self.socket.attach(sender);
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let n = buf.len().min(self.body.len());
        buf[..n].copy_from_slice(&self.body.split_to(n));
        Ok(n)
    }

    fn socket(&self) -> Arc<dyn SocketSink> {
        self.socket.clone()
    }
}

impl Drop for HyperTransport {
    fn drop(&mut self) {
        if let Some(responder) = self.responder.take() {
            tracing::warn!("Request finished without a response, sending 500");
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            let _ = responder.send(response);
        }
    }
}
