use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use tracing::debug;

use super::process::{StopSignal, spawn_line_reader};
use super::progress::parse_progress_line;
use super::types::{ConversionEvent, ConversionJob, EventSink, ProgressEvent};
use crate::engine::error::ConversionError;
use crate::engine::hardware::EncoderKind;
use crate::engine::plan::EncodePlan;

/// Longest the output loop blocks before checking the stop flag again
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// `scale=<w>:<h>:flags=lanczos`
pub fn scale_filter(width: u32, height: u32) -> String {
    format!("scale={}:{}:flags=lanczos", width, height)
}

/// Build the ffmpeg invocation for one plan
///
/// Audio is copied untouched; only the video stream is re-encoded.
pub fn build_encode_cmd(
    ffmpeg: &Path,
    input: &Path,
    output: &Path,
    width: u32,
    height: u32,
    plan: &EncodePlan,
) -> Command {
    let mut cmd = Command::new(ffmpeg);
    cmd.args(["-hide_banner", "-loglevel", "error", "-stats"]);
    cmd.arg("-i").arg(input);
    cmd.args(&plan.args);
    cmd.args(&plan.threading);
    cmd.arg("-vf").arg(scale_filter(width, height));
    cmd.args(["-c:a", "copy", "-movflags", "+faststart", "-y"]);
    cmd.arg(output);
    cmd
}

/// Shell-quoted rendering of a command, for logs
pub fn format_ffmpeg_cmd(cmd: &Command) -> String {
    let parts: Vec<String> = std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|arg| arg.to_string_lossy().to_string())
        .collect();
    shlex::try_join(parts.iter().map(String::as_str)).unwrap_or_else(|_| parts.join(" "))
}

fn is_diagnostic(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.contains("error") || lower.contains("failed")
}

/// Run one encode attempt to completion, streaming progress to `sink`
///
/// The child is parked in `stop` while it runs so a stop request can terminate
/// it from another thread. Returns `Cancelled` as soon as the flag is seen.
pub(crate) fn run_ffmpeg_once(
    mut cmd: Command,
    job: &ConversionJob,
    total_duration: Option<f64>,
    encoder: EncoderKind,
    stop: &StopSignal,
    sink: &dyn EventSink,
) -> Result<(), ConversionError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .map_err(|source| ConversionError::ProcessLaunchFailure { encoder, source })?;

    let (tx, rx) = mpsc::channel::<String>();
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_line_reader(stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_line_reader(stderr, tx.clone()));
    }
    drop(tx);

    debug!(pid = child.id(), encoder = encoder.ffmpeg_name(), job_id = %job.id, "ffmpeg started");
    stop.attach(child);

    let mut elapsed_seconds = 0.0;
    let mut last_diagnostic = String::new();

    loop {
        if stop.is_stop_requested() {
            stop.cancel_active();
            return Err(ConversionError::Cancelled);
        }

        let line = match rx.recv_timeout(STOP_POLL_INTERVAL) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        if let Some(sample) = parse_progress_line(&line, total_duration) {
            if let Some(current) = sample.current_seconds {
                elapsed_seconds = current;
            }
            sink.emit(ConversionEvent::FileProgress(ProgressEvent {
                job_index: job.index,
                total_jobs: job.total,
                elapsed_seconds,
                total_duration_seconds: total_duration,
                percent_complete: sample.percent,
                detail: sample.display(),
            }));
            continue;
        }

        if is_diagnostic(&line) {
            sink.log(&format!("ffmpeg: {}", line));
        } else {
            debug!(encoder = encoder.ffmpeg_name(), "{}", line);
        }
        last_diagnostic = line;
    }

    for reader in readers {
        let _ = reader.join();
    }

    // Both pipes are closed; the child is still in the slot unless a stop raced us
    let Some(mut child) = stop.detach() else {
        return Err(ConversionError::Cancelled);
    };
    let status = child.wait()?;

    if status.success() {
        return Ok(());
    }
    if stop.is_stop_requested() {
        return Err(ConversionError::Cancelled);
    }

    Err(ConversionError::ProcessNonZeroExit {
        encoder,
        status: status.to_string(),
        detail: last_diagnostic,
    })
}
