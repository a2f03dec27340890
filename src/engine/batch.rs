//! Sequential batch over the selected files

use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use super::core::{
    ConversionEngine, ConversionEvent, ConversionJob, ConversionOutcome, EngineConfig, EventSink,
    ProgressEvent, StopSignal, display_name, format_duration,
};
use super::error::{ConversionError, ProbeError};
use super::hardware::{self, EncoderSet};
use super::plan::plan_with_notes;
use super::probe::probe_with_stop;
use super::tier::{Classification, classify, destination_path};

/// Per-run choices made by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchOptions {
    pub gpu_enabled: bool,
    pub overwrite: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            gpu_enabled: true,
            overwrite: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub outcome: ConversionOutcome,
}

/// Outcome counts for a finished (or stopped) batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Files selected, including any never started after a stop
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: usize,
}

impl BatchSummary {
    pub fn from_outcomes(total: usize, outcomes: &[FileOutcome]) -> Self {
        let mut summary = Self {
            total,
            ..Self::default()
        };
        for file in outcomes {
            match file.outcome {
                ConversionOutcome::Success => summary.succeeded += 1,
                ConversionOutcome::Failed(_) => summary.failed += 1,
                ConversionOutcome::Cancelled => summary.cancelled += 1,
                ConversionOutcome::SkippedUnsupportedResolution
                | ConversionOutcome::SkippedAlreadyCorrect => summary.skipped += 1,
            }
        }
        summary
    }

    /// Files that reached a terminal outcome
    pub fn completed(&self) -> usize {
        self.succeeded + self.failed + self.skipped + self.cancelled
    }

    pub fn was_stopped(&self) -> bool {
        self.cancelled > 0 || self.completed() < self.total
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
    pub summary: BatchSummary,
}

/// Overall percentage with the current file's progress blended in, capped at 100
pub fn blended_progress(index: usize, total: usize, file_percent: f64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let fraction = file_percent.clamp(0.0, 100.0) / 100.0;
    ((index as f64 + fraction) / total as f64 * 100.0).min(100.0)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub struct BatchController {
    config: EngineConfig,
    stop: StopSignal,
    engine: ConversionEngine,
}

impl BatchController {
    pub fn new(config: &EngineConfig, stop: &StopSignal) -> Self {
        Self {
            config: config.clone(),
            stop: stop.clone(),
            engine: ConversionEngine::new(config, stop),
        }
    }

    /// Process `paths` in order, one at a time
    ///
    /// Always ends with a `BatchFinished` event, also when stopped early.
    pub fn run(&self, paths: &[PathBuf], options: &BatchOptions, sink: &dyn EventSink) -> BatchReport {
        let total = paths.len();
        info!(files = total, gpu = options.gpu_enabled, overwrite = options.overwrite, "batch started");
        sink.log(&format!("Starting conversion of {} file(s)", total));

        let encoders = if options.gpu_enabled {
            let found = hardware::detect(&self.config.tools.ffmpeg);
            sink.log(&format!("Hardware encoders: {}", found.describe()));
            found
        } else {
            sink.log("GPU acceleration disabled, using software encoding");
            EncoderSet::new()
        };

        let mut outcomes = Vec::with_capacity(total);
        for (index, path) in paths.iter().enumerate() {
            if self.stop.is_stop_requested() {
                sink.log("Stop requested, remaining files not started");
                break;
            }

            let name = display_name(path);
            sink.status(&format!("Processing {}", name));
            sink.emit(ConversionEvent::CurrentFileInfo { index, total });
            sink.emit(file_progress(index, total, 0.0));

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                self.process_file(path, index, total, options, &encoders, sink)
            }))
            .unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                error!(path = %path.display(), "panic while converting: {}", message);
                sink.log(&format!("Unexpected error while processing {}: {}", name, message));
                ConversionOutcome::Failed(format!("internal error: {}", message))
            });

            if outcome == ConversionOutcome::Success {
                sink.emit(file_progress(index, total, 100.0));
            }
            sink.log(&format!("{}: {}", name, outcome));

            let stopped = outcome == ConversionOutcome::Cancelled;
            outcomes.push(FileOutcome {
                path: path.clone(),
                outcome,
            });
            sink.emit(ConversionEvent::OverallProgress(
                outcomes.len() as f64 / total as f64 * 100.0,
            ));

            if stopped {
                break;
            }
        }

        let summary = BatchSummary::from_outcomes(total, &outcomes);
        sink.log(&format!(
            "Finished: {} succeeded, {} failed, {} skipped, {} cancelled",
            summary.succeeded, summary.failed, summary.skipped, summary.cancelled
        ));
        sink.status(if summary.was_stopped() {
            "Conversion stopped"
        } else {
            "Conversion finished"
        });
        info!(?summary, "batch finished");
        sink.emit(ConversionEvent::BatchFinished(summary.clone()));

        BatchReport { outcomes, summary }
    }

    fn process_file(
        &self,
        path: &Path,
        index: usize,
        total: usize,
        options: &BatchOptions,
        encoders: &EncoderSet,
        sink: &dyn EventSink,
    ) -> ConversionOutcome {
        let probed = probe_with_stop(
            &self.config.tools.ffprobe,
            path,
            self.config.probe_timeout,
            &self.stop,
        );
        let info = match probed {
            Ok(info) => info,
            Err(ProbeError::Cancelled) => return ConversionOutcome::Cancelled,
            Err(e) => {
                let err = ConversionError::from(e);
                sink.log(&format!("Could not read {}: {}", path.display(), err));
                return ConversionOutcome::Failed(err.to_string());
            }
        };

        sink.log(&format!(
            "Resolution {}x{}, duration {}, codec {}",
            info.width,
            info.height,
            format_duration(info.duration_seconds),
            info.codec_name
        ));

        let tier = match classify(info.width, info.height) {
            Classification::Unsupported => {
                let reason = ConversionError::UnsupportedResolution {
                    width: info.width,
                    height: info.height,
                };
                sink.log(&format!("Skipping: {} (width must be 3840, 5120 or 7680)", reason));
                return ConversionOutcome::SkippedUnsupportedResolution;
            }
            Classification::AlreadyCorrect(tier) => {
                let reason = ConversionError::AlreadyAtTargetResolution { height: info.height };
                sink.log(&format!("Skipping: {} for {}", reason, tier.label()));
                return ConversionOutcome::SkippedAlreadyCorrect;
            }
            Classification::NeedsResize(tier) => tier,
        };

        sink.log(&format!(
            "{} video, resizing {}x{} -> {}x{}",
            tier.label(),
            info.width,
            info.height,
            tier.width(),
            tier.target_height()
        ));

        let destination = destination_path(path, options.overwrite, &self.config.suffix);
        let job = ConversionJob::new(
            path.to_path_buf(),
            destination,
            info.width,
            tier.target_height(),
            options.gpu_enabled,
        )
        .at_position(index, total);

        let planned = plan_with_notes(job.source_width, job.target_height, job.gpu_requested, encoders);
        for note in &planned.rejected {
            sink.log(&note.to_string());
        }
        if let Some(first) = planned.plans.first() {
            sink.log(&format!("Encoder: {}", first.encoder.display_name()));
        }

        self.engine.convert(&job, &planned.plans, sink)
    }
}

fn file_progress(index: usize, total: usize, percent: f64) -> ConversionEvent {
    ConversionEvent::FileProgress(ProgressEvent {
        job_index: index,
        total_jobs: total,
        elapsed_seconds: 0.0,
        total_duration_seconds: None,
        percent_complete: percent,
        detail: String::new(),
    })
}
