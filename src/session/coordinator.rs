//! Session coordinator
//!
//! The single owner of the connection registry and the recorder pipeline.
//! Connection tasks feed it frames; the control endpoints call start, stop
//! and status on it.

use crate::config::Config;
use crate::recorder::{RecorderError, RecorderPipeline, RecorderResult, RecordingStatus};
use crate::relay::{fan_out, ConnectionId, ConnectionRegistry, FanOutReport, Frame, PeerConnection};

/// Coordinates frame relay and recording for all connected peers
pub struct SessionCoordinator {
    registry: ConnectionRegistry,
    recorder: RecorderPipeline,
}

impl SessionCoordinator {
    pub fn new(registry: ConnectionRegistry, recorder: RecorderPipeline) -> Self {
        Self { registry, recorder }
    }

    /// Build a coordinator from the server configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            ConnectionRegistry::new(config.peer_queue_capacity),
            RecorderPipeline::new(config.recorder_config()),
        )
    }

    pub fn recorder(&self) -> &RecorderPipeline {
        &self.recorder
    }

    pub fn peer_count(&self) -> usize {
        self.registry.len()
    }

    /// Register a newly opened connection
    pub fn connect(&self) -> PeerConnection {
        let peer = self.registry.add();
        tracing::info!(connection_id = %peer.id, "Client connected");
        peer
    }

    /// Deregister a closed connection
    pub fn disconnect(&self, id: ConnectionId) {
        self.registry.remove(id);
        tracing::info!(connection_id = %id, "Client disconnected");
    }

    /// Relay one inbound frame to the other peers and, while recording, to
    /// the encoder. Neither peer delivery failures nor encoder write
    /// failures reach the sending connection.
    pub fn handle_incoming_frame(&self, origin: ConnectionId, frame: Frame) -> FanOutReport {
        let report = fan_out(&self.registry, origin, &frame);
        if !report.evicted.is_empty() {
            tracing::info!("Evicted {} unresponsive peer(s)", report.evicted.len());
        }

        if self.recorder.is_recording() {
            match self.recorder.write_frame(frame) {
                Ok(_) => {}
                // Stopped between the check and the write
                Err(RecorderError::NotRecording) => {}
                Err(e) => tracing::warn!("Error writing to encoder: {}", e),
            }
        }

        report
    }

    /// Text messages are accepted but never enter the frame path
    pub fn handle_text(&self, origin: ConnectionId, text: &str) {
        tracing::debug!(connection_id = %origin, "Received text message: {}", text);
    }

    pub fn request_start(&self) -> RecorderResult<RecordingStatus> {
        self.recorder.start()
    }

    pub fn request_stop(&self) -> RecordingStatus {
        self.recorder.stop()
    }

    pub fn query_status(&self) -> RecordingStatus {
        self.recorder.status()
    }

    /// Stop recording, wait for the encoder to finalize its output and
    /// close every peer connection.
    pub async fn shutdown(&self) -> RecordingStatus {
        let status = self.recorder.shutdown().await;
        self.registry.clear();
        tracing::info!("Session shut down after {} recorded frames", status.frames);
        status
    }
}
