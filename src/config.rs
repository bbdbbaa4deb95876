//! Relay server configuration.
//!
//! Configuration is loaded from environment variables, falling back to the
//! defaults below when a variable is unset.

use crate::recorder::{EncoderSpec, RecorderConfig, VideoSettings};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP/WebSocket bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

/// Default directory served for static files and the recorded video.
pub const DEFAULT_STATIC_DIR: &str = ".";

/// Default output path of the recorded video, relative to the working directory.
pub const DEFAULT_VIDEO_FILE: &str = "out/recorded_video.mp4";

/// Default encoder executable.
pub const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";

/// Default number of frames buffered in front of the encoder.
pub const DEFAULT_RECORDER_QUEUE: usize = 256;

/// Default number of frames buffered per peer connection.
pub const DEFAULT_PEER_QUEUE: usize = 64;

/// Default time the encoder gets to finalize after its input is closed.
pub const DEFAULT_STOP_GRACE_MS: u64 = 5_000;

/// Relay server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address for HTTP and WebSocket traffic (default: "0.0.0.0:3000").
    pub bind_address: String,

    /// Directory served as static files (default: ".").
    pub static_dir: PathBuf,

    /// Path of the recorded video, overwritten by every recording.
    pub video_file: PathBuf,

    /// Fixed dimensions and frame rate declared to the encoder.
    pub video: VideoSettings,

    /// Encoder executable (default: "ffmpeg").
    pub ffmpeg_path: String,

    /// Frames buffered in front of the encoder before frames are dropped.
    pub recorder_queue_capacity: usize,

    /// Frames buffered per peer before the peer is evicted.
    pub peer_queue_capacity: usize,

    /// Grace period for the encoder to exit once its input is closed.
    pub stop_grace: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("RELAY_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let static_dir = vars
            .get("RELAY_STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR));

        let video_file = vars
            .get("RELAY_VIDEO_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_VIDEO_FILE));

        let ffmpeg_path = vars
            .get("RELAY_FFMPEG_PATH")
            .cloned()
            .unwrap_or_else(|| DEFAULT_FFMPEG_PATH.to_string());

        let defaults = VideoSettings::default();
        let video = VideoSettings {
            width: parse_positive(vars, "RELAY_VIDEO_WIDTH", defaults.width)?,
            height: parse_positive(vars, "RELAY_VIDEO_HEIGHT", defaults.height)?,
            frame_rate: parse_positive(vars, "RELAY_FRAME_RATE", defaults.frame_rate)?,
        };

        let recorder_queue_capacity =
            parse_positive(vars, "RELAY_RECORDER_QUEUE", DEFAULT_RECORDER_QUEUE)?;
        let peer_queue_capacity = parse_positive(vars, "RELAY_PEER_QUEUE", DEFAULT_PEER_QUEUE)?;

        let stop_grace = Duration::from_millis(parse_var(
            vars,
            "RELAY_STOP_GRACE_MS",
            DEFAULT_STOP_GRACE_MS,
        )?);

        Ok(Config {
            bind_address,
            static_dir,
            video_file,
            video,
            ffmpeg_path,
            recorder_queue_capacity,
            peer_queue_capacity,
            stop_grace,
        })
    }

    /// Recorder settings derived from this configuration.
    pub fn recorder_config(&self) -> RecorderConfig {
        RecorderConfig {
            encoder: EncoderSpec::ffmpeg(&self.ffmpeg_path, &self.video, &self.video_file),
            queue_capacity: self.recorder_queue_capacity,
            stop_grace: self.stop_grace,
        }
    }
}

fn parse_var<T: FromStr>(
    vars: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match vars.get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{key}={raw}"))),
        None => Ok(default),
    }
}

fn parse_positive<T>(
    vars: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialEq + Default,
{
    let value = parse_var(vars, key, default)?;
    if value == T::default() {
        return Err(ConfigError::InvalidValue(format!("{key} must be greater than zero")));
    }
    Ok(value)
}
