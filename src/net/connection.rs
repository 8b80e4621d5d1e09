//! Per-socket lifecycle for the hyper engine.
//!
//! # Responsibilities
//! - Notify the server when a socket opens and when it closes
//! - Count live sockets so shutdown can wait for them to drain

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::engine::{ConnectionId, SocketSink};
use crate::http::Server;

/// Counts sockets between open and close notifications.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    active: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Announce the socket to `server`. The returned guard announces the
    /// close when dropped.
    pub fn track(
        &self,
        server: Arc<Server>,
        id: ConnectionId,
        sink: Arc<dyn SocketSink>,
    ) -> ConnectionGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        server.connection_opened(id, sink);
        ConnectionGuard {
            server,
            id,
            active: Arc::clone(&self.active),
            idle: Arc::clone(&self.idle),
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Wait until no socket is open, or `timeout` passes. Returns true if
    /// everything drained.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let drained = async {
            loop {
                let notified = self.idle.notified();
                if self.active_count() == 0 {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, drained).await.is_ok()
    }
}

/// Held by the task serving one socket.
pub struct ConnectionGuard {
    server: Arc<Server>,
    id: ConnectionId,
    active: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.server.connection_closed(self.id);
        if self.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

impl std::fmt::Debug for ConnectionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGuard").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DispatchConfig;
    use crate::engine::memory::MemorySocket;

    #[tokio::test]
    async fn test_guard_notifies_server() {
        let server = Arc::new(Server::new(&DispatchConfig::default()));
        let tracker = ConnectionTracker::new();
        let id = ConnectionId::next();

        let guard = tracker.track(Arc::clone(&server), id, MemorySocket::new());
        assert_eq!(tracker.active_count(), 1);
        assert!(server.connection(id).is_some());

        drop(guard);
        assert_eq!(tracker.active_count(), 0);
        assert!(server.connection(id).is_none());
        assert!(tracker.wait_idle(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn test_wait_idle_times_out() {
        let server = Arc::new(Server::new(&DispatchConfig::default()));
        let tracker = ConnectionTracker::new();
        let _guard = tracker.track(server, ConnectionId::next(), MemorySocket::new());
        assert!(!tracker.wait_idle(Duration::from_millis(20)).await);
    }
}
