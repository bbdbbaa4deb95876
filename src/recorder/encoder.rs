//! FFmpeg encoder process
//!
//! Spawns the external encoder for one recording and owns the tasks around
//! it: a writer feeding queued frames into its stdin, a drain for its
//! diagnostic output and a supervisor that observes its exit.

use super::state::{RecorderError, RecorderResult};
use crate::relay::Frame;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Fixed frame geometry declared to the encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoSettings {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            frame_rate: 30,
        }
    }
}

/// Program, arguments and output file of the encoder process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderSpec {
    pub program: String,
    pub args: Vec<String>,
    pub output_path: PathBuf,
}

impl EncoderSpec {
    /// Arbitrary encoder command writing to `output_path`
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            output_path: output_path.into(),
        }
    }

    /// FFmpeg reading an MJPEG image sequence from stdin into an H.264 file
    pub fn ffmpeg(program: &str, video: &VideoSettings, output_path: &Path) -> Self {
        Self::new(program, ffmpeg_args(video, output_path), output_path)
    }
}

/// Build the FFmpeg argument list for one recording.
///
/// Any existing file at `output_path` is overwritten.
pub fn ffmpeg_args(video: &VideoSettings, output_path: &Path) -> Vec<String> {
    vec![
        "-f".to_string(),
        "image2pipe".to_string(),
        "-vcodec".to_string(),
        "mjpeg".to_string(),
        "-s".to_string(),
        format!("{}x{}", video.width, video.height),
        "-r".to_string(),
        video.frame_rate.to_string(),
        "-i".to_string(),
        "-".to_string(), // stdin for frames
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "ultrafast".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-y".to_string(),
        output_path.to_string_lossy().to_string(),
    ]
}

/// What the supervisor observed when the encoder terminated
#[derive(Debug)]
pub(crate) struct EncoderOutcome {
    pub status: io::Result<ExitStatus>,
    pub requested: bool,
}

/// Handle to a running encoder.
///
/// Dropping `frames` closes the encoder's stdin once queued frames are
/// written; firing (or dropping) `terminate` asks the supervisor to wind
/// the process down.
pub(crate) struct EncoderHandle {
    pub frames: mpsc::Sender<Frame>,
    pub terminate: oneshot::Sender<()>,
    pub supervisor: JoinHandle<()>,
}

/// Create the directory the encoder writes its output into
pub(crate) fn prepare_output_dir(output_path: &Path) -> RecorderResult<()> {
    match output_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|e| {
                RecorderError::SpawnFailure(format!(
                    "Failed to create output directory {:?}: {}",
                    parent, e
                ))
            })
        }
        _ => Ok(()),
    }
}

/// Spawn the encoder and its helper tasks.
///
/// Must be called from within a tokio runtime, after the output directory
/// exists. `on_exit` runs on the supervisor task once the process has
/// terminated, whoever caused it.
pub(crate) fn spawn<F>(
    spec: &EncoderSpec,
    queue_capacity: usize,
    stop_grace: Duration,
    on_exit: F,
) -> RecorderResult<EncoderHandle>
where
    F: FnOnce(EncoderOutcome) + Send + 'static,
{
    tracing::info!("Starting encoder: {} {:?}", spec.program, spec.args);

    let mut child = Command::new(&spec.program)
        .args(&spec.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| RecorderError::SpawnFailure(format!("{}: {}", spec.program, e)))?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| RecorderError::SpawnFailure("Failed to capture encoder stdin".to_string()))?;

    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(drain_diagnostics(stderr));
    }

    let (frames, queue) = mpsc::channel(queue_capacity.max(1));
    let (terminate, terminate_rx) = oneshot::channel();

    let writer = tokio::spawn(write_frames(stdin, queue));
    let supervisor = tokio::spawn(supervise(child, writer, terminate_rx, stop_grace, on_exit));

    Ok(EncoderHandle {
        frames,
        terminate,
        supervisor,
    })
}

/// Copy queued frames into the encoder's stdin in arrival order.
async fn write_frames(mut stdin: ChildStdin, mut queue: mpsc::Receiver<Frame>) {
    while let Some(frame) = queue.recv().await {
        if let Err(e) = stdin.write_all(&frame).await {
            // Dropping the queue makes further writes fail fast
            tracing::warn!("Encoder input closed: {}", e);
            return;
        }
    }

    if let Err(e) = stdin.shutdown().await {
        tracing::debug!("Failed to close encoder input: {}", e);
    }
}

/// Log the encoder's stderr until it closes.
async fn drain_diagnostics(stderr: ChildStderr) {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf);
                // FFmpeg redraws its progress line with carriage returns
                for line in text.split('\r').map(str::trim).filter(|l| !l.is_empty()) {
                    tracing::info!(target: "frame_relay::encoder", "{}", line);
                }
            }
            Err(e) => {
                tracing::debug!("Encoder diagnostics closed: {}", e);
                break;
            }
        }
    }
}

async fn supervise<F>(
    mut child: Child,
    writer: JoinHandle<()>,
    terminate: oneshot::Receiver<()>,
    stop_grace: Duration,
    on_exit: F,
) where
    F: FnOnce(EncoderOutcome),
{
    let (status, requested) = tokio::select! {
        status = child.wait() => (status, false),
        // A dropped handle counts as a stop request
        _ = terminate => (wind_down(&mut child, writer, stop_grace).await, true),
    };

    on_exit(EncoderOutcome { status, requested });
}

/// Let the writer flush and close stdin, ask the encoder to terminate and
/// kill it if it has not exited once `grace` has elapsed.
async fn wind_down(
    child: &mut Child,
    writer: JoinHandle<()>,
    grace: Duration,
) -> io::Result<ExitStatus> {
    let deadline = tokio::time::Instant::now() + grace;

    let abort = writer.abort_handle();
    if tokio::time::timeout_at(deadline, writer).await.is_err() {
        tracing::warn!("Encoder input did not drain within {:?}, closing it", grace);
        abort.abort();
    }

    request_terminate(child);

    match tokio::time::timeout_at(deadline, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            tracing::warn!("Encoder did not exit within {:?}, killing it", grace);
            child.kill().await?;
            child.wait().await
        }
    }
}

/// SIGTERM on Unix so the encoder can finalize its output
fn request_terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        // No pid once the process has been reaped
        if let Some(pid) = child.id() {
            if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                tracing::debug!("Failed to signal encoder {}: {}", pid, e);
            }
        }
    }

    #[cfg(not(unix))]
    {
        // No SIGTERM on Windows
        if let Err(e) = child.start_kill() {
            tracing::debug!("Failed to terminate encoder: {}", e);
        }
    }
}
