//! The delivery step: filter matching and fan-out.

use crate::registry::SubscriptionRegistry;
use waypost_types::{InterestFilter, Message};

/// Matching rule: deliver if and only if the filter's `teri` equals the
/// message's exactly and the message's world id is in the filter's set.
pub fn matches(filter: &InterestFilter, world_id: u32, teri: u32) -> bool {
    filter.teri == teri && filter.world_ids.contains(&world_id)
}

/// Pushes `json` (the serialized public shape of `message`) to every
/// live connection whose current filter matches. Connections that have
/// not declared a filter receive nothing.
///
/// Each send is `try_send`: a full outbound queue means the consumer is
/// too slow, and that connection's delivery is dropped rather than
/// stalling delivery to the others.
pub(crate) async fn fan_out(registry: &SubscriptionRegistry, message: &Message, json: &str) {
    let entries = registry.entries().await;
    for (id, sub) in entries.iter() {
        let Some(filter) = &sub.filter else {
            continue;
        };
        if !matches(filter, message.world_id, message.teri) {
            continue;
        }
        if let Err(e) = sub.sender.try_send(json.to_owned()) {
            tracing::warn!(
                connection = %id,
                message_id = message.id,
                "dropping delivery for slow consumer: {}",
                e
            );
        }
    }
}
