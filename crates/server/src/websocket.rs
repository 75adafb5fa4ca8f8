//! WebSocket handling for the edit channel.
//!
//! One task per connection reads frames in arrival order. Edits are applied
//! through the [`Pipeline`](crate::pipeline::Pipeline) and answered with a
//! reload signal once the artifact is published; resume requests are answered
//! with the stored source. Outbound frames go through a channel drained by a
//! dedicated writer task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::{header::SET_COOKIE, HeaderMap},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use livepad_protocol::{ClientMessage, ServerMessage};

use crate::cookie::{session_cookie, session_token};
use crate::pipeline::EditOutcome;
use crate::session::WORKSPACE_KEY;
use crate::state::AppState;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Messages that can be sent through the WebSocket
enum OutboundMessage {
    Json(ServerMessage),
    Pong(Bytes),
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let presented = session_token(&headers);
    let session = state.sessions.resolve(presented.as_deref());
    let token = session.token.clone();

    let upgrade = ws.on_upgrade(move |socket| handle_socket(socket, state, token));
    if session.is_new {
        ([(SET_COOKIE, session_cookie(&session.token))], upgrade).into_response()
    } else {
        upgrade.into_response()
    }
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, session_token: String) {
    let conn_id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
    info!(
        component = "websocket",
        event = "ws.connection.opened",
        connection_id = conn_id,
        "WebSocket connection opened"
    );

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundMessage>(100);

    let send_task = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            let result = match msg {
                OutboundMessage::Json(server_msg) => {
                    ws_tx.send(Message::Text(server_msg.to_json().into())).await
                }
                OutboundMessage::Pong(data) => ws_tx.send(Message::Pong(data)).await,
            };

            if result.is_err() {
                debug!(
                    component = "websocket",
                    event = "ws.send.disconnected",
                    connection_id = conn_id,
                    "WebSocket send failed, client disconnected"
                );
                break;
            }
        }
    });

    while let Some(result) = ws_rx.next().await {
        let text = match result {
            Ok(Message::Text(text)) => text,
            Ok(Message::Ping(data)) => {
                let _ = outbound_tx.send(OutboundMessage::Pong(data)).await;
                continue;
            }
            Ok(Message::Close(_)) => {
                info!(
                    component = "websocket",
                    event = "ws.connection.close_frame",
                    connection_id = conn_id,
                    "Client sent close frame"
                );
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                warn!(
                    component = "websocket",
                    event = "ws.connection.error",
                    connection_id = conn_id,
                    error = %e,
                    "WebSocket error"
                );
                break;
            }
        };

        let client_msg = match ClientMessage::from_json(text.as_str()) {
            Ok(m) => m,
            Err(e) => {
                warn!(
                    component = "websocket",
                    event = "ws.message.parse_failed",
                    connection_id = conn_id,
                    error = %e,
                    payload_bytes = text.len(),
                    payload_preview = %truncate_for_log(text.as_str(), 240),
                    "Failed to parse client message"
                );
                continue;
            }
        };

        handle_client_message(client_msg, &outbound_tx, &state, &session_token, conn_id).await;
    }

    info!(
        component = "websocket",
        event = "ws.connection.closed",
        connection_id = conn_id,
        "WebSocket connection closed"
    );
    // Let queued frames (a final reload) flush before the writer stops.
    drop(outbound_tx);
    let _ = send_task.await;
}

fn truncate_for_log(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

async fn send_json(tx: &mpsc::Sender<OutboundMessage>, msg: ServerMessage) {
    let _ = tx.send(OutboundMessage::Json(msg)).await;
}

async fn handle_client_message(
    msg: ClientMessage,
    client_tx: &mpsc::Sender<OutboundMessage>,
    state: &AppState,
    session_token: &str,
    conn_id: u64,
) {
    match msg {
        ClientMessage::Edit { user, source_lines } => {
            let workspace = state.workspace_for(&user);
            state
                .sessions
                .set_value(session_token, WORKSPACE_KEY, workspace);
            debug!(
                component = "websocket",
                event = "ws.edit.received",
                connection_id = conn_id,
                workspace = %workspace,
                lines = source_lines.len(),
                "Edit received"
            );

            match state.pipeline.apply_edit(workspace, &source_lines).await {
                Ok(EditOutcome::Published { .. }) => {
                    send_json(client_tx, ServerMessage::Reload).await;
                }
                Ok(EditOutcome::CompileFailed(_)) => {
                    // Logged by the pipeline; the preview keeps the last good artifact.
                }
                Ok(EditOutcome::Superseded { .. }) => {}
                Err(e) => {
                    error!(
                        component = "websocket",
                        event = "ws.edit.store_failed",
                        connection_id = conn_id,
                        workspace = %workspace,
                        error = %e,
                        "Failed to persist edit"
                    );
                }
            }
        }

        ClientMessage::Resume { user_id } => {
            let workspace = state.workspace_for(&user_id);
            state
                .sessions
                .set_value(session_token, WORKSPACE_KEY, workspace);

            match state.pipeline.resume(workspace).await {
                Ok(content) => {
                    debug!(
                        component = "websocket",
                        event = "ws.resume.sent",
                        connection_id = conn_id,
                        workspace = %workspace,
                        lines = content.len(),
                        "Resume sent"
                    );
                    send_json(client_tx, ServerMessage::Resume { content }).await;
                }
                Err(e) => {
                    warn!(
                        component = "websocket",
                        event = "ws.resume.failed",
                        connection_id = conn_id,
                        workspace = %workspace,
                        error = %e,
                        "Failed to read workspace source"
                    );
                }
            }
        }

        ClientMessage::Unknown => {
            debug!(
                component = "websocket",
                event = "ws.message.unknown",
                connection_id = conn_id,
                "Ignoring unrecognised message shape"
            );
        }
    }
}
