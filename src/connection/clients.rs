//! Per-handler client bookkeeping.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::connection::handle::Connection;
use crate::engine::ConnectionId;

/// A connection a handler has served, plus the handler's state for it.
pub struct ClientEntry<T> {
    pub connection: Arc<Connection>,
    pub state: Arc<T>,
}

impl<T> Clone for ClientEntry<T> {
    fn clone(&self) -> Self {
        Self {
            connection: Arc::clone(&self.connection),
            state: Arc::clone(&self.state),
        }
    }
}

/// Result of [`ClientSet::check_for_new`].
pub struct CheckedClient<T> {
    pub entry: ClientEntry<T>,
    /// True only on the first request this handler saw from the connection.
    pub is_new: bool,
}

/// Ordered set of clients, at most one entry per connection.
pub struct ClientSet<T> {
    entries: Mutex<Vec<ClientEntry<T>>>,
}

impl<T> Default for ClientSet<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl<T> ClientSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the entry for `connection`, or create it with `init`.
    ///
    /// Returns `None` once the connection is closed: the close path has
    /// already released this set, so adding it back would leak the entry.
    pub fn check_for_new(
        &self,
        connection: &Arc<Connection>,
        init: impl FnOnce(&Arc<Connection>) -> T,
    ) -> Option<CheckedClient<T>> {
        let mut entries = self.entries.lock();
        if connection.is_closed() {
            return None;
        }
        if let Some(existing) = entries
            .iter()
            .find(|entry| entry.connection.id() == connection.id())
        {
            return Some(CheckedClient {
                entry: existing.clone(),
                is_new: false,
            });
        }

        let entry = ClientEntry {
            connection: Arc::clone(connection),
            state: Arc::new(init(connection)),
        };
        entries.push(entry.clone());
        Some(CheckedClient { entry, is_new: true })
    }

    pub fn get(&self, id: ConnectionId) -> Option<ClientEntry<T>> {
        self.entries
            .lock()
            .iter()
            .find(|entry| entry.connection.id() == id)
            .cloned()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|entry| entry.connection.id() == id)
    }

    pub fn remove(&self, id: ConnectionId) -> Option<ClientEntry<T>> {
        let mut entries = self.entries.lock();
        let index = entries.iter().position(|entry| entry.connection.id() == id)?;
        Some(entries.remove(index))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Copy of the current entries, in join order.
    pub fn snapshot(&self) -> Vec<ClientEntry<T>> {
        self.entries.lock().clone()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
