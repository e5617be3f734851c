//! Message persistence over SQLite.
//!
//! Free functions taking a `&rusqlite::Connection`; callers own pooling
//! and blocking-task placement. The delete key is minted here, inside
//! [`create_message`], so a stored message can never exist without one.

use crate::secret::delete_key;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use waypost_types::StoredMessage;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("message not found: {0}")]
    NotFound(i64),
}

/// A validated message-creation payload, ready to persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    pub content: Vec<u32>,
    pub world_id: u32,
    pub teri: u32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// A validated history query: exact `teri`, world id membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilter {
    pub teri: u32,
    pub world_ids: Vec<u32>,
}

/// Serializes a content sequence for storage (space-separated decimal).
fn encode_content(content: &[u32]) -> String {
    content
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses a stored content column back into the integer sequence.
/// An empty column is the empty sequence.
fn decode_content(raw: &str) -> Result<Vec<u32>, std::num::ParseIntError> {
    raw.split_whitespace().map(str::parse).collect()
}

fn map_row_to_message(row: &Row) -> rusqlite::Result<StoredMessage> {
    let raw_content: String = row.get(1)?;
    let content = decode_content(&raw_content).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(StoredMessage {
        id: row.get(0)?,
        content,
        world_id: row.get(2)?,
        teri: row.get(3)?,
        x: row.get(4)?,
        y: row.get(5)?,
        z: row.get(6)?,
        delete_key: row.get(7)?,
    })
}

/// Persists a new message, minting its delete key, and returns the
/// stored row.
pub fn create_message(conn: &Connection, new: &NewMessage) -> Result<StoredMessage, StoreError> {
    let message = conn.query_row(
        "INSERT INTO messages (content, world_id, teri, x, y, z, delete_key)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         RETURNING id, content, world_id, teri, x, y, z, delete_key",
        params![
            encode_content(&new.content),
            new.world_id,
            new.teri,
            new.x,
            new.y,
            new.z,
            delete_key(),
        ],
        map_row_to_message,
    )?;

    Ok(message)
}

/// Retrieves a message by id.
pub fn get_message(conn: &Connection, id: i64) -> Result<StoredMessage, StoreError> {
    conn.query_row(
        "SELECT id, content, world_id, teri, x, y, z, delete_key
         FROM messages WHERE id = ?1",
        [id],
        map_row_to_message,
    )
    .optional()?
    .ok_or(StoreError::NotFound(id))
}

/// Finds all persisted messages whose `teri` matches exactly and whose
/// `world_id` is in the query's set.
pub fn find_messages(
    conn: &Connection,
    query: &QueryFilter,
) -> Result<Vec<StoredMessage>, StoreError> {
    if query.world_ids.is_empty() {
        return Ok(Vec::new());
    }

    // world_id IN (?2, ?3, ...) — the list length is query-dependent, so
    // the placeholder list is built per call.
    let placeholders = (0..query.world_ids.len())
        .map(|i| format!("?{}", i + 2))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!(
        "SELECT id, content, world_id, teri, x, y, z, delete_key
         FROM messages
         WHERE teri = ?1 AND world_id IN ({})
         ORDER BY id ASC",
        placeholders
    );

    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::with_capacity(query.world_ids.len() + 1);
    values.push(Box::new(query.teri));
    for world_id in &query.world_ids {
        values.push(Box::new(*world_id));
    }
    let params: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| v.as_ref()).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params.as_slice(), map_row_to_message)?;

    let mut messages = Vec::new();
    for row in rows {
        messages.push(row?);
    }
    Ok(messages)
}

/// Deletes a message by id. `NotFound` if the id is unknown.
pub fn delete_message(conn: &Connection, id: i64) -> Result<(), StoreError> {
    let count = conn.execute("DELETE FROM messages WHERE id = ?1", [id])?;
    if count == 0 {
        return Err(StoreError::NotFound(id));
    }
    Ok(())
}
