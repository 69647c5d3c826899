//! WebSocket upgrade handler.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tracing::{info, warn};

use signalhub_realtime::connection::AuthenticatedParticipant;

use crate::error::ApiError;
use crate::state::AppState;

/// Query parameter for WebSocket authentication.
#[derive(Debug, serde::Deserialize)]
pub struct WsQuery {
    /// JWT access token.
    #[serde(default)]
    pub token: Option<String>,
}

/// GET /ws?token={jwt} — WebSocket upgrade
pub async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
) -> Result<Response, ApiError> {
    // Authenticate before upgrade
    let participant = state
        .authenticator
        .authenticate(query.token.as_deref().unwrap_or_default())?;

    let max_frame = state.config.realtime.max_message_bytes;
    Ok(ws
        .max_message_size(max_frame)
        .on_upgrade(move |socket| handle_ws_connection(state, participant, socket)))
}

/// Handles an established WebSocket connection.
async fn handle_ws_connection(
    state: AppState,
    participant: AuthenticatedParticipant,
    socket: WebSocket,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let connections = state.engine.connections.clone();
    let mut shutdown = state.engine.shutdown_receiver();

    let (handle, mut outbound_rx) = connections.register(participant.participant_id.clone());
    let conn_id = handle.id;

    info!(
        conn_id = %conn_id,
        participant_id = %participant.participant_id,
        "WebSocket connection established"
    );

    // Spawn outbound message forwarder
    let outbound_task = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    loop {
        tokio::select! {
            incoming = ws_rx.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    connections.handle_inbound(&conn_id, text.as_str()).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                // Ping/pong are answered by axum
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(conn_id = %conn_id, error = %e, "WebSocket error");
                    break;
                }
            },
            _ = shutdown.recv() => break,
        }
    }

    outbound_task.abort();
    connections.unregister(&conn_id).await;

    info!(
        conn_id = %conn_id,
        participant_id = %participant.participant_id,
        "WebSocket connection closed"
    );
}
