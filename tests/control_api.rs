//! Control endpoint tests against the router, without a network listener.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use frame_relay::recorder::{EncoderSpec, RecorderConfig, RecorderPipeline};
use frame_relay::relay::{ConnectionRegistry, Frame};
use frame_relay::server::{router, AppState};
use frame_relay::session::SessionCoordinator;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

fn app_with(
    program: &str,
    args: Vec<String>,
    output: &Path,
    static_dir: &Path,
) -> (Router, Arc<SessionCoordinator>) {
    let coordinator = Arc::new(SessionCoordinator::new(
        ConnectionRegistry::new(16),
        RecorderPipeline::new(RecorderConfig {
            encoder: EncoderSpec::new(program, args, output),
            queue_capacity: 16,
            stop_grace: Duration::from_millis(500),
        }),
    ));
    (router(AppState::new(Arc::clone(&coordinator)), static_dir), coordinator)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = get(app, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_initial_status() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = app_with("sh", vec![], &dir.path().join("v.mp4"), dir.path());

    let (status, body) = get_json(&app, "/recording-status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recording"], Value::Bool(false));
    assert_eq!(body["frames"], 0);
    assert!(body["videoFile"].is_null());
}

#[cfg(unix)]
#[tokio::test]
async fn test_start_and_stop_recording() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out").join("recorded_video.mp4");
    let script = format!("trap '' TERM; exec cat > '{}'", output.display());
    let (app, coordinator) = app_with("sh", vec!["-c".to_string(), script], &output, dir.path());

    let (status, body) = get_json(&app, "/start-recording").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Recording started");
    assert_eq!(body["recording"], Value::Bool(true));

    // Starting twice keeps the running session
    let (status, body) = get_json(&app, "/start-recording").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recording"], Value::Bool(true));

    let peer = coordinator.connect();
    coordinator.handle_incoming_frame(peer.id, Frame::from_static(b"frame-1"));
    coordinator.handle_incoming_frame(peer.id, Frame::from_static(b"frame-2"));

    let (_, body) = get_json(&app, "/recording-status").await;
    assert_eq!(body["recording"], Value::Bool(true));
    assert_eq!(body["frames"], 2);
    assert!(body["videoFile"].is_null());

    let (status, body) = get_json(&app, "/stop-recording").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Recording stopped");
    assert_eq!(body["recording"], Value::Bool(false));
    assert_eq!(body["frames"], 2);
    assert_eq!(body["videoFile"], output.to_string_lossy().as_ref());

    let (_, body) = get_json(&app, "/recording-status").await;
    assert_eq!(body["recording"], Value::Bool(false));
    assert_eq!(body["videoFile"], output.to_string_lossy().as_ref());

    // The encoder finalizes its output in the background after stop
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while coordinator.recorder().last_exit().is_none() {
        assert!(std::time::Instant::now() < deadline);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(std::fs::read(&output).unwrap(), b"frame-1frame-2");
}

#[tokio::test]
async fn test_stop_while_idle() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = app_with("sh", vec![], &dir.path().join("v.mp4"), dir.path());

    let (status, body) = get_json(&app, "/stop-recording").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recording"], Value::Bool(false));
    assert_eq!(body["frames"], 0);
}

#[tokio::test]
async fn test_start_failure_reports_spawn_error() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = app_with(
        "/nonexistent/frame-relay-encoder",
        vec![],
        &dir.path().join("v.mp4"),
        dir.path(),
    );

    let (status, body) = get_json(&app, "/start-recording").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "SPAWN_FAILURE");
    assert_eq!(body["recording"], Value::Bool(false));
    assert_eq!(body["frames"], 0);

    let (_, body) = get_json(&app, "/recording-status").await;
    assert_eq!(body["recording"], Value::Bool(false));
}

#[tokio::test]
async fn test_start_refused_after_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let (app, coordinator) = app_with("sh", vec![], &dir.path().join("v.mp4"), dir.path());

    coordinator.shutdown().await;

    let (status, body) = get_json(&app, "/start-recording").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "SHUTTING_DOWN");
    assert_eq!(body["recording"], Value::Bool(false));
}

#[tokio::test]
async fn test_root_serves_viewer_page() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = app_with("sh", vec![], &dir.path().join("v.mp4"), dir.path());

    let (status, body) = get(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).unwrap().contains("<html"));
}

#[tokio::test]
async fn test_static_files_served_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("out")).unwrap();
    std::fs::write(dir.path().join("out").join("clip.mp4"), b"video-bytes").unwrap();
    let (app, _) = app_with("sh", vec![], &dir.path().join("v.mp4"), dir.path());

    let (status, body) = get(&app, "/out/clip.mp4").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"video-bytes");

    let (status, _) = get(&app, "/missing.txt").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
