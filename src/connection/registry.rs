//! Server-wide connection registry.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::connection::handle::Connection;
use crate::engine::{ConnectionId, SocketSink};
use crate::observability::metrics;

/// Live connections keyed by ID. Safe to call from the engine thread and
/// from workers at the same time.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Arc<Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the connection for `id`, creating it with `sink` if absent.
    /// The flag is true when this call created it.
    pub fn observe(
        &self,
        id: ConnectionId,
        sink: impl FnOnce() -> Arc<dyn SocketSink>,
    ) -> (Arc<Connection>, bool) {
        let observed = match self.connections.entry(id) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let connection = Arc::new(Connection::new(id, sink()));
                entry.insert(Arc::clone(&connection));
                (connection, true)
            }
        };
        if observed.1 {
            tracing::trace!(connection_id = %id, "Connection registered");
            metrics::set_active_connections(self.connections.len());
        }
        observed
    }

    pub fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.connections.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn remove(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        let removed = self.connections.remove(&id).map(|(_, connection)| connection);
        if removed.is_some() {
            tracing::trace!(connection_id = %id, "Connection removed");
            metrics::set_active_connections(self.connections.len());
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn clear(&self) {
        self.connections.clear();
        metrics::set_active_connections(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::memory::MemorySocket;

    #[test]
    fn test_observe_creates_once() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::from_raw(10);

        let (first, created) = registry.observe(id, || MemorySocket::new() as Arc<dyn SocketSink>);
        assert!(created);
        let (second, created) = registry.observe(id, || MemorySocket::new() as Arc<dyn SocketSink>);
        assert!(!created);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let registry = ConnectionRegistry::new();
        registry.observe(ConnectionId::from_raw(1), || MemorySocket::new() as Arc<dyn SocketSink>);
        registry.observe(ConnectionId::from_raw(2), || MemorySocket::new() as Arc<dyn SocketSink>);

        assert!(registry.remove(ConnectionId::from_raw(1)).is_some());
        assert!(registry.remove(ConnectionId::from_raw(1)).is_none());
        assert!(registry.contains(ConnectionId::from_raw(2)));

        registry.clear();
        assert!(registry.is_empty());
    }
}
