//! Recording state management
//!
//! Defines the recorder state machine, the status payload reported to
//! control callers and the recorder error type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current state of the recording pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// No encoder running
    Idle,
    /// Frames are being forwarded to the encoder
    Recording,
}

impl Default for RecordingState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Status payload returned by every control operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingStatus {
    /// Whether a recording is active
    pub recording: bool,

    /// Frames forwarded to the encoder in the current or last recording
    pub frames: u64,

    /// Output file of the last finished recording; `None` while recording
    /// or before the first recording
    pub video_file: Option<String>,
}

/// How the last encoder process terminated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncoderExit {
    /// Process exit code, absent when killed by a signal or never observed
    pub code: Option<i32>,

    /// Whether the process reported success
    pub success: bool,

    /// Whether the exit followed a stop request
    pub requested: bool,

    /// Frames forwarded during the recording
    pub frames: u64,

    /// Output file of the recording
    pub output_path: String,

    /// When the exit was observed
    pub exited_at: DateTime<Utc>,
}

/// Errors reported by the recording pipeline
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Failed to start encoder: {0}")]
    SpawnFailure(String),

    #[error("Failed to write frame: {0}")]
    WriteFailure(String),

    #[error("Not recording")]
    NotRecording,

    #[error("Recorder is shutting down")]
    ShuttingDown,
}

/// Result type alias using RecorderError
pub type RecorderResult<T> = Result<T, RecorderError>;
