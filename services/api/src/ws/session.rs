//! Manages the WebSocket connection lifecycle for a capture session.
//!
//! Authentication happens before the upgrade: a missing or wrong token is
//! refused with HTTP 401 and no protocol state is ever established. After
//! the upgrade, commands are read and handled strictly one at a time, so a
//! connection never has two commands in flight.

use super::{
    cycle::{Outcome, SessionContext, SessionError},
    protocol::{ClientMessage, ServerMessage},
};
use crate::state::AppState;
use anyhow::Result;
use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{Instrument, error, info, warn};

#[derive(Deserialize)]
pub struct AuthParams {
    token: Option<String>,
}

/// Axum handler to upgrade an HTTP connection to a WebSocket, after checking
/// the shared-secret token.
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthParams>,
    ws: WebSocketUpgrade,
) -> Response {
    if params.token.as_deref() != Some(state.config.auth_token.as_str()) {
        warn!("WebSocket connection refused: missing or invalid token");
        return (
            StatusCode::UNAUTHORIZED,
            Json(ServerMessage::Error {
                message: "unauthorized".to_string(),
                details: "missing or invalid token".to_string(),
            }),
        )
            .into_response();
    }
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Main loop for an authenticated connection. Each command runs to
/// completion before the next frame is read.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);
    let session_id = NEXT_SESSION.fetch_add(1, Ordering::Relaxed);
    let span = tracing::info_span!("ws_session", session_id);

    async move {
        info!("Client connected");
        let (mut socket_tx, mut socket_rx) = socket.split();
        let mut session = SessionContext::new(state);

        while let Some(msg_result) = socket_rx.next().await {
            let ws_msg = match msg_result {
                Ok(msg) => msg,
                Err(e) => {
                    error!(error = ?e, "Error receiving from client WebSocket");
                    break;
                }
            };
            match ws_msg {
                Message::Text(text) => {
                    let outcome = match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(command) => {
                            info!(?command, "Received command");
                            session.handle_command(command, Instant::now()).await
                        }
                        Err(e) => {
                            warn!(error = %e, "Rejecting malformed command");
                            Outcome::Reply(SessionError::MalformedCommand(e.to_string()).to_reply())
                        }
                    };
                    match outcome {
                        Outcome::Reply(reply) => {
                            if send_msg(&mut socket_tx, reply).await.is_err() {
                                error!("Failed to send reply; terminating session");
                                break;
                            }
                        }
                        Outcome::Close => {
                            info!("Stop requested; closing connection");
                            let _ = socket_tx.send(Message::Close(None)).await;
                            break;
                        }
                    }
                }
                Message::Binary(_) => warn!("Ignoring unexpected binary frame"),
                Message::Close(_) => {
                    info!("Client sent close frame");
                    break;
                }
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
        info!(phase = ?session.phase(), "Session finished");
    }
    .instrument(span)
    .await
}

/// Serializes and sends a `ServerMessage` to the client.
async fn send_msg(socket_tx: &mut SplitSink<WebSocket, Message>, msg: ServerMessage) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
