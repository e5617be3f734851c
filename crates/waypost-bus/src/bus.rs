//! The process-wide publish point.

use crate::delivery;
use crate::registry::SubscriptionRegistry;
use std::sync::Arc;
use tokio::sync::Mutex;
use waypost_types::{Message, StoredMessage};

/// Single publish point for the "message created" event.
///
/// Owns the [`SubscriptionRegistry`] and serializes publishes: the
/// internal publish lock guarantees that every subscriber observes
/// messages in creation order (per-connection ordering then follows
/// from the in-order outbound channel). Cloning shares the same bus.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: SubscriptionRegistry,
    publish_lock: Arc<Mutex<()>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            registry: SubscriptionRegistry::new(),
            publish_lock: Arc::new(Mutex::new(())),
        }
    }

    /// The registry connection handlers register against.
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Publishes a newly persisted message to all matching live
    /// subscribers. The delivered payload is the public shape — the
    /// delete key never leaves this function.
    ///
    /// Fan-out is CPU-only plus non-blocking sends; a slow subscriber
    /// cannot stall it.
    pub async fn publish(&self, stored: &StoredMessage) {
        let public = Message::from(stored);
        let json = match serde_json::to_string(&public) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(message_id = stored.id, "failed to serialize delivery payload: {}", e);
                return;
            }
        };

        let _ordered = self.publish_lock.lock().await;
        delivery::fan_out(&self.registry, &public, &json).await;
    }
}
