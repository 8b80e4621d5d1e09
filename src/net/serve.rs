//! Hyper accept loop feeding the dispatch server.
//!
//! # Responsibilities
//! - Accept sockets until shutdown is triggered
//! - Serve HTTP/1.1 on each socket with hyper
//! - Buffer each request body, then run `Server::dispatch` on a blocking
//!   thread, which stands in for the engine's own I/O thread
//! - Drain open sockets on shutdown, up to a deadline

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Response, StatusCode};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::sync::oneshot;

use crate::engine::{ConnectionId, Inbound, RequestHead};
use crate::http::Server;
use crate::lifecycle::Shutdown;
use crate::net::connection::ConnectionTracker;
use crate::net::exchange::{HyperSocket, HyperTransport};
use crate::net::listener::{Accepted, Listener};

/// How long shutdown waits for open sockets.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Run the accept loop until `shutdown` fires.
pub async fn serve(server: Arc<Server>, listener: Listener, shutdown: &Shutdown) {
    let tracker = ConnectionTracker::new();
    let mut stop = shutdown.subscribe();

    loop {
        tokio::select! {
            _ = stop.recv() => {
                tracing::info!("Accept loop stopping");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok(accepted) => {
                    let task = serve_connection(
                        Arc::clone(&server),
                        accepted,
                        tracker.clone(),
                        shutdown,
                    );
                    tokio::spawn(task);
                }
                Err(error) => {
                    tracing::error!(error = %error, "Accept failed");
                }
            },
        }
    }

    if !tracker.wait_idle(DRAIN_TIMEOUT).await {
        tracing::warn!(
            remaining = tracker.active_count(),
            "Connections still open after drain timeout"
        );
    }
}

fn serve_connection(
    server: Arc<Server>,
    accepted: Accepted,
    tracker: ConnectionTracker,
    shutdown: &Shutdown,
) -> impl std::future::Future<Output = ()> + Send + 'static {
    let mut stop = shutdown.subscribe();

    async move {
        let Accepted {
            id,
            stream,
            peer,
            permit,
        } = accepted;
        let socket = HyperSocket::new();
        let _guard = tracker.track(Arc::clone(&server), id, socket.clone());

        let upload_limit = server.settings().limits.max_upload_size;
        let service = {
            let socket = Arc::clone(&socket);
            service_fn(move |request| {
                exchange(
                    Arc::clone(&server),
                    id,
                    Arc::clone(&socket),
                    upload_limit,
                    request,
                )
            })
        };

        let connection = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
        tokio::pin!(connection);

        let mut draining = false;
        loop {
            tokio::select! {
                result = connection.as_mut() => {
                    if let Err(error) = result {
                        tracing::debug!(connection_id = %id, peer_addr = %peer, error = %error, "Connection error");
                    }
                    break;
                }
                _ = socket.closed(), if !draining => {
                    draining = true;
                    connection.as_mut().graceful_shutdown();
                }
                _ = stop.recv(), if !draining => {
                    draining = true;
                    connection.as_mut().graceful_shutdown();
                }
            }
        }
        drop(permit);
    }
}

/// One request on a hyper connection.
async fn exchange(
    server: Arc<Server>,
    id: ConnectionId,
    socket: Arc<HyperSocket>,
    upload_limit: usize,
    request: axum::http::Request<Incoming>,
) -> Result<Response<Body>, Infallible> {
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(Body::new(body), upload_limit).await {
        Ok(body) => body,
        Err(error) => {
            tracing::warn!(connection_id = %id, limit = upload_limit, error = %error, "Request body rejected");
            return Ok(plain(
                StatusCode::BAD_REQUEST,
                format!("Request body must be less than {upload_limit} bytes!"),
            ));
        }
    };

    let uri = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path().to_string(), |pq| pq.as_str().to_string());
    let head = RequestHead {
        method: parts.method,
        uri,
        headers: parts.headers,
    };

    let (responder, response) = oneshot::channel();
    let transport = HyperTransport::new(socket, body, responder);
    let inbound = Inbound::new(id, head, Box::new(transport));

    let dispatch = tokio::task::spawn_blocking(move || server.dispatch(inbound));
    tokio::spawn(async move {
        match dispatch.await {
            Ok(Ok(outcome)) => tracing::trace!(connection_id = %id, outcome = outcome.as_str(), "Dispatched"),
            Ok(Err(error)) => tracing::debug!(connection_id = %id, error = %error, "Dispatch ended with error"),
            Err(error) => tracing::error!(connection_id = %id, error = %error, "Dispatch task failed"),
        }
    });

    Ok(response.await.unwrap_or_else(|_| {
        plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
    }))
}

fn plain(status: StatusCode, body: String) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        axum::http::header::CONTENT_TYPE,
        axum::http::HeaderValue::from_static("text/plain"),
    );
    response
}
