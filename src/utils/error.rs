//! Error types and handling
//!
//! Common error types used across the application.

use crate::config::ConfigError;
use crate::recorder::RecorderError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Recording error: {0}")]
    Recording(#[from] RecorderError),
}

/// Error payload returned by the control endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        let code = match &error {
            AppError::Io(_) => "IO_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Recording(RecorderError::SpawnFailure(_)) => "SPAWN_FAILURE",
            AppError::Recording(RecorderError::WriteFailure(_)) => "WRITE_FAILURE",
            AppError::Recording(RecorderError::NotRecording) => "NOT_RECORDING",
            AppError::Recording(RecorderError::ShuttingDown) => "SHUTTING_DOWN",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
