//! WebSocket subscription endpoint and per-connection state machine.
//!
//! A connection starts with no filter and receives nothing until its
//! first valid declaration. Each declaration wholesale-replaces the
//! filter. A malformed declaration terminates the connection without a
//! reply; there is no unsubscribe message — disconnecting is the only
//! way to stop deliveries.

use crate::AppState;
use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        Extension, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use waypost_messages::validation;

/// Outbound queue depth per connection. 256 queued deliveries is ample
/// for a reader keeping up; beyond that the client is too slow and
/// deliveries are dropped by the bus.
const OUTBOUND_QUEUE_DEPTH: usize = 256;

/// WebSocket handler: `GET /ws`. Read access is unauthenticated.
pub async fn ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drives one subscriber connection from upgrade to termination.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Bounded channel between the bus and this socket; the bus drops
    // deliveries rather than block when it fills up.
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_QUEUE_DEPTH);

    let registry = state.bus.registry().clone();
    let conn_id = registry.register(tx).await;

    // Forward queued deliveries to the socket.
    let send_task = tokio::spawn(async move {
        while let Some(json) = rx.recv().await {
            if sender.send(WsMessage::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Declaration loop. Any frame that is not a valid filter declaration
    // ends the connection; nothing is sent back to the client.
    while let Some(Ok(frame)) = receiver.next().await {
        match frame {
            WsMessage::Text(text) => {
                let declaration: serde_json::Value = match serde_json::from_str(text.as_str()) {
                    Ok(value) => value,
                    Err(e) => {
                        tracing::debug!(
                            connection = %conn_id,
                            "unparseable subscription declaration, terminating: {}",
                            e
                        );
                        break;
                    }
                };

                match validation::validate_filter(&declaration) {
                    Ok(filter) => {
                        registry.set_filter(conn_id, filter).await;
                    }
                    Err(e) => {
                        tracing::debug!(
                            connection = %conn_id,
                            field = e.field,
                            "invalid subscription declaration, terminating"
                        );
                        break;
                    }
                }
            }
            WsMessage::Close(_) => break,
            WsMessage::Binary(_) => {
                tracing::debug!(
                    connection = %conn_id,
                    "binary frame on subscription socket, terminating"
                );
                break;
            }
            // Ping/pong keepalives are answered by the transport layer.
            _ => {}
        }
    }

    // Deregistration is synchronous with respect to publishes: once it
    // returns, no later publish can reach this connection.
    registry.deregister(conn_id).await;
    send_task.abort();
}
