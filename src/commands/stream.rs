//! Frame ingress over WebSocket
//!
//! Each connection runs one task that reads inbound frames and drains the
//! frames other peers relayed to it, in order.

use crate::relay::{Frame, PeerConnection};
use crate::server::AppState;
use crate::session::SessionCoordinator;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{Html, IntoResponse, Response};
use std::sync::Arc;

/// Page that captures, sends and displays frames
const VIEWER_PAGE: &str = include_str!("../../assets/index.html");

/// `/` serves the viewer page, or upgrades to a frame stream when asked to.
pub async fn viewer_or_stream(
    ws: Option<WebSocketUpgrade>,
    State(state): State<AppState>,
) -> Response {
    match ws {
        Some(ws) => upgrade(ws, state),
        None => Html(VIEWER_PAGE).into_response(),
    }
}

/// `/ws` always upgrades to a frame stream.
pub async fn stream(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    upgrade(ws, state)
}

fn upgrade(ws: WebSocketUpgrade, state: AppState) -> Response {
    ws.on_upgrade(move |socket| handle_peer_socket(socket, state.coordinator))
}

/// Manages a single peer connection for its whole lifetime.
async fn handle_peer_socket(mut socket: WebSocket, coordinator: Arc<SessionCoordinator>) {
    let PeerConnection { id, mut outbound } = coordinator.connect();

    loop {
        tokio::select! {
            relayed = outbound.recv() => match relayed {
                Some(frame) => {
                    if socket.send(Message::Binary(frame.to_vec())).await.is_err() {
                        break; // Client disconnected
                    }
                }
                None => {
                    tracing::debug!(connection_id = %id, "Removed from registry, closing");
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            },
            inbound = socket.recv() => match inbound {
                Some(Ok(Message::Binary(data))) => {
                    coordinator.handle_incoming_frame(id, Frame::from(data));
                }
                Some(Ok(Message::Text(text))) => coordinator.handle_text(id, &text),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {} // Ping/pong
                Some(Err(e)) => {
                    tracing::debug!(connection_id = %id, "WebSocket error: {}", e);
                    break;
                }
            },
        }
    }

    coordinator.disconnect(id);
}
