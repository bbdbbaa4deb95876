//! Frame Relay - real-time video frame relay with on-demand recording.
//!
//! Clients push encoded frames over WebSocket; every frame is rebroadcast to
//! the other connected clients and, while recording, piped into an external
//! encoder that assembles them into a video file.

pub mod commands;
pub mod config;
pub mod recorder;
pub mod relay;
pub mod server;
pub mod session;
pub mod utils;

use config::Config;
use session::SessionCoordinator;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utils::AppResult;

/// Initialize logging, load configuration and serve until shutdown
pub async fn run() -> AppResult<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "frame_relay=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Frame Relay v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded: {:?}", config);

    serve(config).await
}

/// Serve the relay with the given configuration.
///
/// On SIGINT/SIGTERM the recording is stopped and the encoder given time to
/// finalize its output before the server exits.
pub async fn serve(config: Config) -> AppResult<()> {
    let coordinator = Arc::new(SessionCoordinator::from_config(&config));
    let app = server::router(server::AppState::new(Arc::clone(&coordinator)), &config.static_dir);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    tracing::info!("Server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            server::shutdown_signal().await;
            coordinator.shutdown().await;
        })
        .await?;

    tracing::info!("Server shut down");
    Ok(())
}
