//! Connection registry: the live set of receiving WebSocket connections.
//!
//! Each connection is represented by the sending half of its outbound queue.
//! The registry never touches sockets directly; the per-connection actor owns
//! the socket and drains the queue into it.

use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Sender half of a WebSocket connection's outbound queue.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;

/// Process-unique identity of a registered connection. Never sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Returned by [`ConnectionRegistry::register`]; deregisters exactly that connection.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
}

impl ConnectionHandle {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

/// Shared set of open connections, cloned into every task that needs it.
///
/// Membership changes and broadcast iteration may race freely: DashMap
/// shard locks keep the map consistent, and a removal waits for any
/// in-progress send on that shard, so a connection is never sent to after
/// `deregister` has returned.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    pub(super) connections: Arc<DashMap<ConnectionId, ConnectionSender>>,
    next_id: Arc<AtomicU64>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to the live set.
    pub fn register(&self, sender: ConnectionSender) -> ConnectionHandle {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.connections.insert(id, sender);

        tracing::debug!(
            connection_id = %id,
            connections = self.connections.len(),
            "Connection registered"
        );

        ConnectionHandle { id }
    }

    /// Remove a connection. Removing one that is already gone is a no-op.
    /// Returns whether anything was removed.
    pub fn deregister(&self, handle: &ConnectionHandle) -> bool {
        let removed = self.connections.remove(&handle.id).is_some();

        if removed {
            tracing::debug!(
                connection_id = %handle.id,
                connections = self.connections.len(),
                "Connection unregistered"
            );
        }
        removed
    }

    pub fn contains(&self, handle: &ConnectionHandle) -> bool {
        self.connections.contains_key(&handle.id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
