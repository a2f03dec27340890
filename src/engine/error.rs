use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use super::hardware::EncoderKind;

/// Failure to read structural metadata from a source file
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to launch ffprobe: {0}")]
    Launch(#[source] std::io::Error),

    #[error("ffprobe exited with {status}: {stderr}")]
    ToolFailure { status: String, stderr: String },

    #[error("ffprobe did not finish within {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("no video stream found")]
    NoVideoStream,

    #[error("malformed ffprobe output: {0}")]
    MalformedOutput(String),

    #[error("ffprobe was stopped")]
    Cancelled,
}

/// Everything that can go wrong (or be refused) while converting one file
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("could not read video info: {0}")]
    ProbeFailure(#[source] ProbeError),

    #[error("unsupported resolution {width}x{height}")]
    UnsupportedResolution { width: u32, height: u32 },

    #[error("height is already {height}")]
    AlreadyAtTargetResolution { height: u32 },

    #[error(
        "{} cannot encode {width}x{height} (limit {})",
        .encoder.display_name(),
        limit_text(.encoder)
    )]
    EncoderUnavailableForResolution {
        encoder: EncoderKind,
        width: u32,
        height: u32,
    },

    #[error("failed to launch ffmpeg ({}): {source}", .encoder.ffmpeg_name())]
    ProcessLaunchFailure {
        encoder: EncoderKind,
        #[source]
        source: std::io::Error,
    },

    #[error("ffmpeg ({}) exited with {status}{}", .encoder.ffmpeg_name(), detail_suffix(.detail))]
    ProcessNonZeroExit {
        encoder: EncoderKind,
        status: String,
        detail: String,
    },

    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("could not move {} into place: {source}", .temp.display())]
    Finalize {
        temp: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error while running ffmpeg: {0}")]
    Io(#[from] std::io::Error),

    #[error("cancelled")]
    Cancelled,
}

fn limit_text(encoder: &EncoderKind) -> String {
    match encoder.max_resolution() {
        Some((width, height)) => format!("{}x{}", width, height),
        None => "none".to_string(),
    }
}

fn detail_suffix(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(": {}", detail)
    }
}

impl From<ProbeError> for ConversionError {
    fn from(err: ProbeError) -> Self {
        match err {
            ProbeError::Timeout(limit) => ConversionError::Timeout(limit),
            ProbeError::Cancelled => ConversionError::Cancelled,
            other => ConversionError::ProbeFailure(other),
        }
    }
}

/// Misuse of the session command surface
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no files selected")]
    NoFilesSelected,

    #[error("a conversion is already running")]
    AlreadyRunning,

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}
