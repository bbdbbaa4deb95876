//! Recorder pipeline
//!
//! Owns the encoder lifecycle: the Idle/Recording state machine, the frame
//! counter and the output path of the current recording.
//!
//! Every transition (start, stop, frame write, exit observed) happens under
//! one mutex that is never held across an await point. Each recording gets a
//! generation number so the exit of an old encoder cannot end a newer one.

use super::encoder::{self, EncoderHandle, EncoderOutcome, EncoderSpec};
use super::state::{EncoderExit, RecorderError, RecorderResult, RecordingState, RecordingStatus};
use crate::relay::Frame;
use chrono::Utc;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

/// Frames whose size is logged at the start of each recording
const LOGGED_LEADING_FRAMES: u64 = 5;

/// Progress is logged every this many frames (~10s at 30fps)
const PROGRESS_LOG_INTERVAL: u64 = 300;

/// Settings for the recorder pipeline
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Encoder command and output file
    pub encoder: EncoderSpec,

    /// Frames buffered in front of the encoder before writes are dropped
    pub queue_capacity: usize,

    /// Time the encoder gets to finalize once its input is closed
    pub stop_grace: Duration,
}

impl RecorderConfig {
    pub fn new(encoder: EncoderSpec) -> Self {
        Self {
            encoder,
            queue_capacity: crate::config::DEFAULT_RECORDER_QUEUE,
            stop_grace: Duration::from_millis(crate::config::DEFAULT_STOP_GRACE_MS),
        }
    }
}

#[derive(Default)]
struct Inner {
    state: RecordingState,
    frame_count: u64,
    output_path: Option<PathBuf>,
    generation: u64,
    encoder: Option<EncoderHandle>,
    last_exit: Option<EncoderExit>,
    /// Set once by `shutdown`; no recording starts afterwards
    closed: bool,
}

impl Inner {
    fn status(&self) -> RecordingStatus {
        let recording = self.state == RecordingState::Recording;
        RecordingStatus {
            recording,
            frames: self.frame_count,
            video_file: if recording {
                None
            } else {
                self.output_path
                    .as_ref()
                    .map(|p| p.to_string_lossy().to_string())
            },
        }
    }
}

/// Manages the external encoder for one recording at a time
pub struct RecorderPipeline {
    config: RecorderConfig,
    inner: Arc<Mutex<Inner>>,
}

impl RecorderPipeline {
    /// Create an idle pipeline
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            config,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Get the current recording state
    pub fn state(&self) -> RecordingState {
        self.inner.lock().state
    }

    pub fn is_recording(&self) -> bool {
        self.state() == RecordingState::Recording
    }

    /// Snapshot of the current status, without side effects
    pub fn status(&self) -> RecordingStatus {
        self.inner.lock().status()
    }

    /// How the most recent encoder terminated, if any has
    pub fn last_exit(&self) -> Option<EncoderExit> {
        self.inner.lock().last_exit.clone()
    }

    /// Start recording.
    ///
    /// Spawns the encoder and resets the frame counter. While already
    /// recording this is a no-op that returns the current status. If the
    /// encoder cannot be spawned the pipeline stays idle. Fails with
    /// `ShuttingDown` once `shutdown` has been called.
    pub fn start(&self) -> RecorderResult<RecordingStatus> {
        encoder::prepare_output_dir(&self.config.encoder.output_path).map_err(|e| {
            tracing::error!("Error starting recording: {}", e);
            e
        })?;

        let mut inner = self.inner.lock();
        if inner.closed {
            tracing::warn!("Start requested during shutdown");
            return Err(RecorderError::ShuttingDown);
        }
        if inner.state == RecordingState::Recording {
            tracing::debug!("Start requested while already recording");
            return Ok(inner.status());
        }

        let generation = inner.generation + 1;
        let shared = Arc::downgrade(&self.inner);
        let handle = encoder::spawn(
            &self.config.encoder,
            self.config.queue_capacity,
            self.config.stop_grace,
            move |outcome| observe_exit(&shared, generation, outcome),
        )
        .map_err(|e| {
            tracing::error!("Error starting recording: {}", e);
            e
        })?;

        inner.generation = generation;
        inner.frame_count = 0;
        inner.output_path = Some(self.config.encoder.output_path.clone());
        inner.encoder = Some(handle);
        inner.state = RecordingState::Recording;

        tracing::info!("Recording started: {:?}", self.config.encoder.output_path);
        Ok(inner.status())
    }

    /// Forward one frame to the encoder.
    ///
    /// Never waits: when the encoder queue is full or its input has closed
    /// the frame is dropped and `WriteFailure` returned, leaving the state
    /// untouched. Returns the updated frame count on success.
    pub fn write_frame(&self, frame: Frame) -> RecorderResult<u64> {
        let mut inner = self.inner.lock();
        let encoder = match (&inner.state, &inner.encoder) {
            (RecordingState::Recording, Some(encoder)) => encoder,
            _ => return Err(RecorderError::NotRecording),
        };

        let size = frame.len();
        encoder.frames.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => {
                RecorderError::WriteFailure("encoder queue is full, frame dropped".to_string())
            }
            TrySendError::Closed(_) => {
                RecorderError::WriteFailure("encoder input is closed".to_string())
            }
        })?;

        inner.frame_count += 1;
        let count = inner.frame_count;

        if count <= LOGGED_LEADING_FRAMES {
            tracing::debug!("Frame {} size: {} bytes", count - 1, size);
        }
        if count % PROGRESS_LOG_INTERVAL == 0 {
            tracing::info!("Recorded {} frames so far", count);
        }

        Ok(count)
    }

    /// Stop recording.
    ///
    /// Closes the encoder input and requests termination; the pipeline is
    /// idle as soon as this returns while the process exits in the
    /// background. A no-op while idle.
    pub fn stop(&self) -> RecordingStatus {
        self.stop_encoder().0
    }

    /// Stop recording for good and wait for the encoder to finish writing
    /// its output. Later calls to `start` fail with `ShuttingDown`.
    pub async fn shutdown(&self) -> RecordingStatus {
        self.inner.lock().closed = true;
        let (status, supervisor) = self.stop_encoder();
        if let Some(supervisor) = supervisor {
            if let Err(e) = supervisor.await {
                tracing::warn!("Encoder supervisor failed: {}", e);
            }
        }
        status
    }

    fn stop_encoder(&self) -> (RecordingStatus, Option<JoinHandle<()>>) {
        let mut inner = self.inner.lock();
        if inner.state == RecordingState::Idle {
            return (inner.status(), None);
        }

        inner.state = RecordingState::Idle;
        let supervisor = inner.encoder.take().map(|handle| {
            let EncoderHandle {
                frames,
                terminate,
                supervisor,
            } = handle;
            // Closing the queue lets the writer flush and close stdin
            drop(frames);
            let _ = terminate.send(());
            supervisor
        });

        tracing::info!("Ending recording after {} frames", inner.frame_count);
        (inner.status(), supervisor)
    }
}

/// Record an encoder exit and force the pipeline idle if that encoder is
/// still the current one.
fn observe_exit(inner: &Weak<Mutex<Inner>>, generation: u64, outcome: EncoderOutcome) {
    let (code, success) = match &outcome.status {
        Ok(status) => (status.code(), status.success()),
        Err(e) => {
            tracing::error!("Encoder process error: {}", e);
            (None, false)
        }
    };

    let Some(inner) = inner.upgrade() else {
        return;
    };
    let mut inner = inner.lock();

    if inner.generation != generation {
        tracing::debug!("Ignoring exit of superseded encoder (code {:?})", code);
        return;
    }

    if inner.state == RecordingState::Recording {
        tracing::warn!("Encoder exited while recording (code {:?})", code);
        inner.state = RecordingState::Idle;
        inner.encoder = None;
    }

    let output_path = inner
        .output_path
        .as_ref()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_default();

    tracing::info!(
        "Encoder exited with code {:?}. Recorded {} frames to {}",
        code,
        inner.frame_count,
        output_path
    );

    inner.last_exit = Some(EncoderExit {
        code,
        success,
        requested: outcome.requested,
        frames: inner.frame_count,
        output_path,
        exited_at: Utc::now(),
    });
}
