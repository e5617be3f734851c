//! Shared types for the Waypost platform.
//!
//! This crate provides the message shapes used across all Waypost crates:
//! the persisted [`StoredMessage`] (which carries the delete key), the
//! public [`Message`] wire shape (which never does), and the
//! [`InterestFilter`] a live subscriber declares.
//!
//! No crate in the workspace depends on anything *except* `waypost-types`
//! for cross-cutting type definitions. This keeps the dependency graph
//! clean and prevents circular dependencies.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A persisted message, as stored and as published on the event bus.
///
/// Carries the `delete_key` minted at creation. Only the creation
/// response may expose it; every other surface goes through
/// [`Message`], which strips it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    /// Database-assigned id, unique and immutable.
    pub id: i64,
    /// Opaque payload: an ordered sequence of non-negative integers.
    pub content: Vec<u32>,
    /// Primary routing key for subscription filters.
    pub world_id: u32,
    /// Secondary partition key; a subscriber matches exactly one value.
    pub teri: u32,
    /// Coordinates, sign unconstrained, carried through unchanged.
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// One-time deletion secret, set exactly once at creation.
    pub delete_key: String,
}

/// The public wire shape of a message: [`StoredMessage`] minus the
/// delete key. Used for query responses and WebSocket deliveries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub content: Vec<u32>,
    #[serde(rename = "worldID")]
    pub world_id: u32,
    pub teri: u32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<&StoredMessage> for Message {
    fn from(m: &StoredMessage) -> Self {
        Self {
            id: m.id,
            content: m.content.clone(),
            world_id: m.world_id,
            teri: m.teri,
            x: m.x,
            y: m.y,
            z: m.z,
        }
    }
}

/// A subscriber's declared interest: one `teri` partition plus a set of
/// world ids. Duplicate world ids in a declaration collapse under set
/// semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterestFilter {
    pub teri: u32,
    pub world_ids: HashSet<u32>,
}
