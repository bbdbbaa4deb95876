//! # Relay Web Server
//!
//! An Axum server exposing the relay to browsers on the local network.
//!
//! ## Endpoints
//!
//! | Path | Description |
//! |------|-------------|
//! | `/` | Viewer page, or a frame stream on WebSocket upgrade |
//! | `/ws` | Frame stream (WebSocket) |
//! | `/start-recording` | Start forwarding frames to the encoder |
//! | `/stop-recording` | Stop recording and report the output file |
//! | `/recording-status` | Current recording status |
//!
//! Any other path is served from the static directory, which is how the
//! recorded video is downloaded.

use crate::commands::{recording, stream};
use crate::session::SessionCoordinator;
use axum::routing::get;
use axum::Router;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Shared state passed to all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<SessionCoordinator>,
}

impl AppState {
    pub fn new(coordinator: Arc<SessionCoordinator>) -> Self {
        Self { coordinator }
    }
}

/// Build the router with all relay endpoints.
pub fn router(state: AppState, static_dir: impl AsRef<Path>) -> Router {
    Router::new()
        .route("/", get(stream::viewer_or_stream))
        .route("/ws", get(stream::stream))
        .route("/start-recording", get(recording::start_recording))
        .route("/stop-recording", get(recording::stop_recording))
        .route("/recording-status", get(recording::recording_status))
        .fallback_service(ServeDir::new(static_dir.as_ref()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => tracing::error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
