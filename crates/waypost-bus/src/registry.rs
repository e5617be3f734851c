//! Live-connection registry.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock, RwLockReadGuard};
use uuid::Uuid;
use waypost_types::InterestFilter;

/// Identifies one live connection for its lifetime.
pub type ConnectionId = Uuid;

/// One live connection's mutable state: the current filter (absent
/// until the client's first valid declaration) and the bounded outbound
/// queue feeding its socket.
#[derive(Debug)]
pub(crate) struct Subscription {
    pub(crate) filter: Option<InterestFilter>,
    pub(crate) sender: mpsc::Sender<String>,
}

/// Owns the mapping from connection id to [`Subscription`]. Cloning the
/// registry clones the handle; all clones share the same map.
///
/// All write-lock critical sections are brief map operations that never
/// span an `.await` on foreign futures, so mutations (register,
/// filter replacement, deregister) are atomic with respect to any
/// in-flight match evaluation holding the read lock.
#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    inner: Arc<RwLock<HashMap<ConnectionId, Subscription>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registers a new connection with no filter yet. Returns its id.
    pub async fn register(&self, sender: mpsc::Sender<String>) -> ConnectionId {
        let id = Uuid::new_v4();
        self.inner
            .write()
            .await
            .insert(id, Subscription { filter: None, sender });
        tracing::debug!(connection = %id, "registered subscriber connection");
        id
    }

    /// Replaces the connection's filter wholesale. Returns `false` if
    /// the connection is no longer registered.
    pub async fn set_filter(&self, id: ConnectionId, filter: InterestFilter) -> bool {
        let mut entries = self.inner.write().await;
        match entries.get_mut(&id) {
            Some(sub) => {
                sub.filter = Some(filter);
                true
            }
            None => false,
        }
    }

    /// Removes a connection. Takes the write lock, so once this returns
    /// no subsequent publish can deliver to the connection.
    pub async fn deregister(&self, id: ConnectionId) {
        if self.inner.write().await.remove(&id).is_some() {
            tracing::debug!(connection = %id, "deregistered subscriber connection");
        }
    }

    /// Number of live connections. For logging and tests.
    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.len()
    }

    pub(crate) async fn entries(&self) -> RwLockReadGuard<'_, HashMap<ConnectionId, Subscription>> {
        self.inner.read().await
    }
}
