//! Database layer for the Waypost platform.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode
//! initialization, embedded SQL migrations, and the schema for the
//! message store. Every table is created through versioned migrations
//! managed by this crate.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: a single-process service needs no
//!   external database; WAL allows concurrent readers with a single
//!   writer, which matches the Waypost access pattern (query-heavy,
//!   rate-limited writes).
//! - **`r2d2` connection pool**: bounded connection reuse without
//!   manual lifetime management.
//! - **Embedded migrations**: SQL files are compiled into the binary
//!   via `include_str!`, ensuring migrations ship with the server and
//!   cannot drift from the code that depends on them.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
