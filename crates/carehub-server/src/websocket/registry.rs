//! Connection registry: live connections and the identity index.
//!
//! Both maps live behind one lock and are always mutated together, so the
//! identity index never names a connection the primary map lacks and never
//! holds an empty set. Readers get owned snapshots; no lock is held while
//! sending.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use carehub_core::ConnectionId;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::connection::ClientConnection;

#[derive(Default)]
struct Inner {
    connections: HashMap<ConnectionId, Arc<ClientConnection>>,
    by_identity: HashMap<String, HashSet<ConnectionId>>,
}

/// Registry of live WebSocket connections.
pub struct ConnectionRegistry {
    inner: Mutex<Inner>,
    queue_capacity: usize,
}

impl ConnectionRegistry {
    /// Create an empty registry whose connections buffer `queue_capacity`
    /// outbound messages each.
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Register a new connection with a fresh outbound queue.
    ///
    /// Returns the connection and the receiving end of its queue, which the
    /// session's writer task drains.
    pub fn register(
        &self,
        identity: Option<&str>,
    ) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let connection = self.register_with(tx, identity);
        (connection, rx)
    }

    /// Register a new connection around an existing outbound sender.
    ///
    /// Generates a fresh connection ID; an empty identity is treated as
    /// anonymous. Never fails.
    pub fn register_with(
        &self,
        outbound: mpsc::Sender<Arc<String>>,
        identity: Option<&str>,
    ) -> Arc<ClientConnection> {
        let identity = identity.filter(|s| !s.is_empty()).map(str::to_owned);
        let id = ConnectionId::new();
        let connection = Arc::new(ClientConnection::new(id.clone(), identity.clone(), outbound));

        let mut inner = self.inner.lock();
        let _ = inner.connections.insert(id.clone(), Arc::clone(&connection));
        if let Some(identity) = &identity {
            let _ = inner
                .by_identity
                .entry(identity.clone())
                .or_default()
                .insert(id.clone());
        }
        let total = inner.connections.len();
        drop(inner);

        info!(conn_id = %id, identity = identity.as_deref().unwrap_or("-"), total, "connection registered");
        connection
    }

    /// Remove a connection and fire its close signal.
    ///
    /// Unknown IDs are a no-op. Returns whether an entry was removed.
    pub fn unregister(&self, id: &ConnectionId) -> bool {
        let mut inner = self.inner.lock();
        let Some(connection) = inner.connections.remove(id) else {
            return false;
        };
        if let Some(identity) = connection.identity() {
            let emptied = inner.by_identity.get_mut(identity).is_some_and(|set| {
                let _ = set.remove(id);
                set.is_empty()
            });
            if emptied {
                let _ = inner.by_identity.remove(identity);
            }
        }
        let total = inner.connections.len();
        drop(inner);

        connection.close();
        info!(conn_id = %id, identity = connection.identity().unwrap_or("-"), total, "connection unregistered");
        true
    }

    /// Record liveness for a connection. Unknown IDs are a no-op.
    pub fn touch(&self, id: &ConnectionId) {
        if let Some(connection) = self.get(id) {
            connection.touch();
        } else {
            debug!(conn_id = %id, "touch for unknown connection");
        }
    }

    /// Connection IDs attributed to `identity` (empty if unknown).
    pub fn connections_for(&self, identity: &str) -> HashSet<ConnectionId> {
        self.inner
            .lock()
            .by_identity
            .get(identity)
            .cloned()
            .unwrap_or_default()
    }

    /// Look up a live connection.
    pub fn get(&self, id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        self.inner.lock().connections.get(id).cloned()
    }

    /// Whether `id` is live.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.inner.lock().connections.contains_key(id)
    }

    /// Every live connection at the time of the call.
    pub fn snapshot(&self) -> Vec<Arc<ClientConnection>> {
        self.inner.lock().connections.values().cloned().collect()
    }

    /// Live connections attributed to `identity` at the time of the call.
    pub fn snapshot_for(&self, identity: &str) -> Vec<Arc<ClientConnection>> {
        let inner = self.inner.lock();
        inner
            .by_identity
            .get(identity)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.connections.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of live connections.
    pub fn count(&self) -> usize {
        self.inner.lock().connections.len()
    }

    /// Number of distinct identities with at least one live connection.
    pub fn user_count(&self) -> usize {
        self.inner.lock().by_identity.len()
    }
}
