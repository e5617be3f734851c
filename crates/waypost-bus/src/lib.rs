//! The Waypost real-time core: in-process fan-out of newly created
//! messages to live WebSocket subscribers.
//!
//! Three pieces:
//! - [`SubscriptionRegistry`] — one entry per live connection, holding
//!   that connection's current interest filter and outbound channel.
//! - The delivery step ([`matches`] + fan-out) — evaluates every live
//!   subscription against a published message and pushes matching
//!   deliveries, without ever blocking on a slow subscriber.
//! - [`EventBus`] — the single process-wide publish point, owned by the
//!   server's composition root. The creation path publishes; connection
//!   handlers register/deregister. The bus holds no history: a
//!   connection registered after a publish never observes it.

mod bus;
mod delivery;
mod registry;

pub use bus::EventBus;
pub use delivery::matches;
pub use registry::{ConnectionId, SubscriptionRegistry};
