//! Message creation, history query, and deletion handlers.
//!
//! All validation happens before any persistence or bus interaction: a
//! request either produces a fully validated value, or fails with 400
//! before anything observable happens. The creation response is the
//! only surface that ever exposes a delete key.

use crate::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Extension, Path, Query,
    },
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use waypost_messages::{
    create_message, delete_message, find_messages, get_message, validation, StoreError,
};
use waypost_types::{Message, StoredMessage};

/// Creation response: the public message shape plus the one-time
/// delete key.
#[derive(Debug, Serialize)]
pub struct CreatedMessage {
    pub id: i64,
    pub content: Vec<u32>,
    #[serde(rename = "deleteKey")]
    pub delete_key: String,
    #[serde(rename = "worldID")]
    pub world_id: u32,
    pub teri: u32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<StoredMessage> for CreatedMessage {
    fn from(m: StoredMessage) -> Self {
        Self {
            id: m.id,
            content: m.content,
            delete_key: m.delete_key,
            world_id: m.world_id,
            teri: m.teri,
            x: m.x,
            y: m.y,
            z: m.z,
        }
    }
}

/// Maps a [`StoreError`] to the client-facing status code, logging
/// non-lookup errors.
///
/// Unknown ids are deliberately indistinguishable from malformed input
/// (400, not 404); everything else is a generic 500.
fn store_err_to_status(e: StoreError) -> StatusCode {
    match e {
        StoreError::NotFound(_) => StatusCode::BAD_REQUEST,
        err => {
            tracing::error!(error = %err, "store operation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// POST /messages
pub async fn create_message_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<CreatedMessage>, StatusCode> {
    let Json(payload) = payload.map_err(|_| StatusCode::BAD_REQUEST)?;

    let new = validation::validate_create(&payload).map_err(|e| {
        tracing::debug!(field = e.field, "rejected message creation payload");
        StatusCode::BAD_REQUEST
    })?;

    let pool = state.pool.clone();
    let stored = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(|e| {
            tracing::error!(error = %e, "failed to get db connection for create_message");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        create_message(&conn, &new).map_err(store_err_to_status)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "create_message task join error");
        StatusCode::INTERNAL_SERVER_ERROR
    })??;

    // Persisted; fan out to live subscribers before responding.
    state.bus.publish(&stored).await;

    Ok(Json(CreatedMessage::from(stored)))
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub teri: String,
    pub filter: String,
}

/// GET /messages?teri=<int>&filter=<comma-separated ints>
pub async fn query_messages_handler(
    Extension(state): Extension<Arc<AppState>>,
    query: Result<Query<MessagesQuery>, QueryRejection>,
) -> Result<Json<Vec<Message>>, StatusCode> {
    let Query(query) = query.map_err(|_| StatusCode::BAD_REQUEST)?;

    let filter = validation::parse_query(&query.teri, &query.filter).map_err(|e| {
        tracing::debug!(field = e.field, "rejected history query");
        StatusCode::BAD_REQUEST
    })?;

    let pool = state.pool.clone();
    let messages = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(|e| {
            tracing::error!(error = %e, "failed to get db connection for find_messages");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        find_messages(&conn, &filter).map_err(store_err_to_status)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "find_messages task join error");
        StatusCode::INTERNAL_SERVER_ERROR
    })??;

    Ok(Json(messages.iter().map(Message::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    #[serde(rename = "deleteKey")]
    pub delete_key: Option<String>,
}

/// DELETE /messages/{id}?deleteKey=<string>
///
/// 204 on success, 400 for an unknown (or unparseable) id, 401 for a
/// key mismatch. No retraction event is published: subscribers already
/// holding a copy are not notified.
pub async fn delete_message_handler(
    Extension(state): Extension<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
    Query(params): Query<DeleteParams>,
) -> Result<StatusCode, StatusCode> {
    let Path(id) = id.map_err(|_| StatusCode::BAD_REQUEST)?;
    let supplied_key = params.delete_key.unwrap_or_default();

    let pool = state.pool.clone();
    tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(|e| {
            tracing::error!(error = %e, "failed to get db connection for delete_message");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

        let message = get_message(&conn, id).map_err(store_err_to_status)?;
        if message.delete_key != supplied_key {
            return Err(StatusCode::UNAUTHORIZED);
        }

        delete_message(&conn, id).map_err(store_err_to_status)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "delete_message task join error");
        StatusCode::INTERNAL_SERVER_ERROR
    })??;

    Ok(StatusCode::NO_CONTENT)
}
