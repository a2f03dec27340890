use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::Duration;
use uuid::Uuid;

use super::ffmpeg_info::ToolPaths;
use crate::engine::batch::BatchSummary;

/// Default suffix inserted before the extension of converted files
pub const DEFAULT_SUFFIX: &str = "_resized";

/// Default ffprobe deadline
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings shared by every job of a run
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub tools: ToolPaths,
    pub probe_timeout: Duration,
    pub suffix: String,
    /// Append executed commands and outcomes to this file
    pub debug_log: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tools: ToolPaths::default(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            suffix: DEFAULT_SUFFIX.to_string(),
            debug_log: None,
        }
    }
}

/// One source file scheduled for conversion
#[derive(Debug, Clone, Serialize)]
pub struct ConversionJob {
    pub id: Uuid,
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    pub source_width: u32,
    pub target_height: u32,
    pub gpu_requested: bool,

    // Position in the batch, for progress reporting
    pub index: usize,
    pub total: usize,
}

impl ConversionJob {
    pub fn new(
        source_path: PathBuf,
        destination_path: PathBuf,
        source_width: u32,
        target_height: u32,
        gpu_requested: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_path,
            destination_path,
            source_width,
            target_height,
            gpu_requested,
            index: 0,
            total: 1,
        }
    }

    pub fn at_position(mut self, index: usize, total: usize) -> Self {
        self.index = index;
        self.total = total;
        self
    }

    pub fn overwrites_source(&self) -> bool {
        self.destination_path == self.source_path
    }

    /// Where ffmpeg writes
    ///
    /// ffmpeg cannot read and write the same file, so in-place conversions go to a
    /// hidden sibling that replaces the source once the encode succeeded.
    pub fn encode_target(&self) -> PathBuf {
        if !self.overwrites_source() {
            return self.destination_path.clone();
        }
        let stem = self
            .source_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());
        let ext = self
            .source_path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        self.source_path
            .with_file_name(format!(".{}.reheight-tmp{}", stem, ext))
    }

    pub fn file_name(&self) -> String {
        display_name(&self.source_path)
    }
}

/// File name for log lines, falling back to the full path
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Terminal state of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ConversionOutcome {
    Success,
    Failed(String),
    SkippedUnsupportedResolution,
    SkippedAlreadyCorrect,
    Cancelled,
}

impl ConversionOutcome {
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            Self::SkippedUnsupportedResolution | Self::SkippedAlreadyCorrect
        )
    }
}

impl fmt::Display for ConversionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
            Self::SkippedUnsupportedResolution => write!(f, "skipped (unsupported width)"),
            Self::SkippedAlreadyCorrect => write!(f, "skipped (height already correct)"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Progress inside the current file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub job_index: usize,
    pub total_jobs: usize,
    /// Position reached in the source, in seconds
    pub elapsed_seconds: f64,
    pub total_duration_seconds: Option<f64>,
    pub percent_complete: f64,
    /// `HH:MM:SS.fff`, or a frame count when ffmpeg reports no timestamp
    pub detail: String,
}

/// A timestamped, user-facing log line
#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub timestamp: DateTime<Local>,
    pub text: String,
}

impl LogLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            text: text.into(),
        }
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format("%H:%M:%S"), self.text)
    }
}

/// Message from the worker to the front end
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionEvent {
    StatusChanged(String),
    LogLine(LogLine),
    /// Share of files that reached a terminal outcome
    OverallProgress(f64),
    FileProgress(ProgressEvent),
    CurrentFileInfo { index: usize, total: usize },
    BatchFinished(BatchSummary),
}

/// Receiver of worker events
pub trait EventSink {
    fn emit(&self, event: ConversionEvent);

    fn log(&self, text: &str) {
        self.emit(ConversionEvent::LogLine(LogLine::new(text)));
    }

    fn status(&self, text: &str) {
        self.emit(ConversionEvent::StatusChanged(text.to_string()));
    }
}

impl EventSink for Sender<ConversionEvent> {
    fn emit(&self, event: ConversionEvent) {
        // The front end may already be gone; the batch still finishes cleanly
        let _ = self.send(event);
    }
}
