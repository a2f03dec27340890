use std::fs;

use tracing::{debug, info, warn};

use super::ffmpeg_cmd::{build_encode_cmd, format_ffmpeg_cmd, run_ffmpeg_once};
use super::log::write_debug_log;
use super::process::StopSignal;
use super::progress::format_duration;
use super::types::{
    ConversionEvent, ConversionJob, ConversionOutcome, EngineConfig, EventSink, ProgressEvent,
};
use crate::engine::error::ConversionError;
use crate::engine::plan::EncodePlan;
use crate::engine::probe::probe_with_stop;

/// Runs one job through its plans, falling back until one succeeds
pub struct ConversionEngine {
    config: EngineConfig,
    stop: StopSignal,
}

impl ConversionEngine {
    pub fn new(config: &EngineConfig, stop: &StopSignal) -> Self {
        Self {
            config: config.clone(),
            stop: stop.clone(),
        }
    }

    /// Convert one file, trying `plans` in order
    ///
    /// A failed plan moves on to the next one after a single "Falling back to"
    /// notice. A stop request ends the job immediately without trying further plans.
    pub fn convert(
        &self,
        job: &ConversionJob,
        plans: &[EncodePlan],
        sink: &dyn EventSink,
    ) -> ConversionOutcome {
        if plans.is_empty() {
            return ConversionOutcome::Failed("no encoder to try".to_string());
        }

        let outcome = match self.try_convert(job, plans, sink) {
            Ok(()) => ConversionOutcome::Success,
            Err(ConversionError::Cancelled) => ConversionOutcome::Cancelled,
            Err(e) => ConversionOutcome::Failed(e.to_string()),
        };

        self.debug_log(&format!("{}: {}", job.source_path.display(), outcome));
        outcome
    }

    fn try_convert(
        &self,
        job: &ConversionJob,
        plans: &[EncodePlan],
        sink: &dyn EventSink,
    ) -> Result<(), ConversionError> {
        if self.stop.is_stop_requested() {
            return Err(ConversionError::Cancelled);
        }

        let total_duration = self.probe_duration(job);
        let output = job.encode_target();
        let mut last_error = None;

        for (attempt, plan) in plans.iter().enumerate() {
            if self.stop.is_stop_requested() {
                return Err(ConversionError::Cancelled);
            }

            let encoder = plan.encoder;
            if attempt > 0 {
                sink.log(&format!("Falling back to {}", encoder.display_name()));
                sink.emit(ConversionEvent::FileProgress(ProgressEvent {
                    job_index: job.index,
                    total_jobs: job.total,
                    elapsed_seconds: 0.0,
                    total_duration_seconds: total_duration,
                    percent_complete: 0.0,
                    detail: String::new(),
                }));
            }

            let cmd = build_encode_cmd(
                &self.config.tools.ffmpeg,
                &job.source_path,
                &output,
                job.source_width,
                job.target_height,
                plan,
            );
            let cmd_line = format_ffmpeg_cmd(&cmd);
            sink.log(&format!("Encoding with {}", encoder.display_name()));
            sink.log(&format!("Command: {}", cmd_line));
            self.debug_log(&format!("=== {} ===\n{}", job.file_name(), cmd_line));
            info!(job_id = %job.id, encoder = encoder.ffmpeg_name(), path = %job.source_path.display(), "encode attempt {}", attempt + 1);

            match run_ffmpeg_once(cmd, job, total_duration, encoder, &self.stop, sink) {
                Ok(()) => return self.finalize(job),
                Err(ConversionError::Cancelled) => {
                    info!(job_id = %job.id, "encode cancelled");
                    return Err(ConversionError::Cancelled);
                }
                Err(e) => {
                    warn!(job_id = %job.id, encoder = encoder.ffmpeg_name(), error = %e, "encode attempt failed");
                    sink.log(&format!("{} failed: {}", encoder.display_name(), e));
                    last_error = Some(e);
                }
            }
        }

        // `plans` is non-empty, so at least one attempt recorded an error
        Err(last_error.unwrap_or(ConversionError::Cancelled))
    }

    /// Duration for percentages; unknown when the probe fails or reports zero
    fn probe_duration(&self, job: &ConversionJob) -> Option<f64> {
        match probe_with_stop(
            &self.config.tools.ffprobe,
            &job.source_path,
            self.config.probe_timeout,
            &self.stop,
        ) {
            Ok(info) if info.duration_seconds > 0.0 => {
                debug!(job_id = %job.id, duration = %format_duration(info.duration_seconds), "probed duration");
                Some(info.duration_seconds)
            }
            Ok(_) => None,
            Err(e) => {
                debug!(job_id = %job.id, error = %e, "duration unknown");
                None
            }
        }
    }

    /// Move an in-place encode over its source
    fn finalize(&self, job: &ConversionJob) -> Result<(), ConversionError> {
        if !job.overwrites_source() {
            return Ok(());
        }
        let temp = job.encode_target();
        fs::rename(&temp, &job.source_path)
            .map_err(|source| ConversionError::Finalize { temp, source })
    }

    fn debug_log(&self, message: &str) {
        if let Some(path) = &self.config.debug_log {
            if let Err(e) = write_debug_log(path, message) {
                debug!(error = %e, "could not write debug log");
            }
        }
    }
}
