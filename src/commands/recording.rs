//! Recording control handlers

use crate::recorder::{RecorderError, RecordingStatus};
use crate::server::AppState;
use crate::utils::{AppError, ErrorResponse};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// Successful control response: a message plus the recording status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlResponse {
    pub status: String,

    #[serde(flatten)]
    pub recording: RecordingStatus,
}

/// Failed control response; still carries a definite recording status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlErrorResponse {
    #[serde(flatten)]
    pub error: ErrorResponse,

    #[serde(flatten)]
    pub recording: RecordingStatus,
}

/// Start recording
pub async fn start_recording(State(state): State<AppState>) -> Response {
    match state.coordinator.request_start() {
        Ok(recording) => Json(ControlResponse {
            status: "Recording started".to_string(),
            recording,
        })
        .into_response(),
        Err(e) => {
            let status = match e {
                RecorderError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            let body = ControlErrorResponse {
                error: ErrorResponse::from(AppError::from(e)),
                recording: state.coordinator.query_status(),
            };
            (status, Json(body)).into_response()
        }
    }
}

/// Stop recording
pub async fn stop_recording(State(state): State<AppState>) -> Json<ControlResponse> {
    Json(ControlResponse {
        status: "Recording stopped".to_string(),
        recording: state.coordinator.request_stop(),
    })
}

/// Get current recording status
pub async fn recording_status(State(state): State<AppState>) -> Json<RecordingStatus> {
    Json(state.coordinator.query_status())
}
