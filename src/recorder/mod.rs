//! Recording system module
//!
//! This module implements the recording pipeline:
//! - RecorderPipeline state machine owning the encoder lifecycle
//! - Encoder process spawning, stdin feeding and diagnostics
//! - Status and error types reported to control callers

pub mod encoder;
pub mod pipeline;
pub mod state;

pub use encoder::{ffmpeg_args, EncoderSpec, VideoSettings};
pub use pipeline::{RecorderConfig, RecorderPipeline};
pub use state::{EncoderExit, RecorderError, RecorderResult, RecordingState, RecordingStatus};
