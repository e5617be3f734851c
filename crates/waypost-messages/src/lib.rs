//! The Waypost message store.
//!
//! Implements payload validation, delete-key issuance, and message
//! persistence (create, find, delete) over a SQLite connection.
//!
//! Validation happens entirely at the boundary: a payload either becomes
//! a fully-constrained typed value here, or the request dies with a
//! [`ValidationError`] before anything is persisted or published.

mod secret;
mod store;
pub mod validation;

pub use secret::{delete_key, DELETE_KEY_LEN};
pub use store::{
    create_message, delete_message, find_messages, get_message, NewMessage, QueryFilter,
    StoreError,
};
pub use validation::ValidationError;
