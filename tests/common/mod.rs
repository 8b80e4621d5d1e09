//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use request_dispatch::config::{DispatchConfig, ListenerConfig, WorkerConfig};
use request_dispatch::engine::memory::{MemorySocket, MemoryTransport, Recording};
use request_dispatch::engine::{ConnectionId, Inbound, RequestHead};
use request_dispatch::http::Outcome;
use request_dispatch::net::{serve, Listener};
use request_dispatch::{DispatchError, Server, Shutdown};
use tokio::task::JoinHandle;

/// Config with the worker pool switched off.
pub fn inline_config() -> DispatchConfig {
    DispatchConfig {
        workers: WorkerConfig {
            enabled: false,
            ..WorkerConfig::default()
        },
        ..DispatchConfig::default()
    }
}

/// Config with `count` workers.
pub fn pooled_config(count: usize) -> DispatchConfig {
    DispatchConfig {
        workers: WorkerConfig {
            enabled: true,
            count,
            thread_name_prefix: "it-worker".into(),
        },
        ..DispatchConfig::default()
    }
}

pub fn server(config: &DispatchConfig) -> Arc<Server> {
    let server = Arc::new(Server::new(config));
    server.start().unwrap();
    server
}

/// A client connection on the in-memory engine.
pub struct Client {
    pub id: ConnectionId,
    pub socket: Arc<MemorySocket>,
}

impl Client {
    pub fn new() -> Self {
        Self {
            id: ConnectionId::next(),
            socket: MemorySocket::new(),
        }
    }

    pub fn send(
        &self,
        server: &Server,
        head: RequestHead,
        body: &str,
    ) -> (Result<Outcome, DispatchError>, Arc<Mutex<Recording>>) {
        let (transport, recording) = MemoryTransport::new(Arc::clone(&self.socket));
        let transport = transport.with_body(body);
        let outcome = server.dispatch(Inbound::new(self.id, head, Box::new(transport)));
        (outcome, recording)
    }

    pub fn get(&self, server: &Server, uri: &str) -> (Outcome, Recording) {
        let (outcome, recording) = self.send(server, RequestHead::new(axum::http::Method::GET, uri), "");
        let recording = recording.lock().clone();
        (outcome.unwrap(), recording)
    }
}

/// Poll `check` until it holds or five seconds pass.
pub fn wait_until(mut check: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(Instant::now() < deadline, "condition never held");
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// A dispatch server listening on an ephemeral port.
pub struct Running {
    pub addr: SocketAddr,
    pub server: Arc<Server>,
    pub shutdown: Shutdown,
    pub task: JoinHandle<()>,
}

impl Running {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = self.task.await;
        self.server.stop();
    }
}

pub async fn start_http(server: Arc<Server>) -> Running {
    let listener = Listener::bind(&ListenerConfig {
        bind_address: "127.0.0.1:0".into(),
        max_connections: 16,
    })
    .await
    .unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let task = {
        let server = Arc::clone(&server);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { serve(server, listener, &shutdown).await })
    };

    Running {
        addr,
        server,
        shutdown,
        task,
    }
}
