// Input probing using ffprobe

use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use super::core::StopSignal;
use super::core::process::{RunError, run_until};
use super::error::ProbeError;

/// Frame rate assumed when ffprobe reports nothing usable
pub const DEFAULT_FRAME_RATE: f64 = 30.0;

/// Structural metadata of a source file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaDescriptor {
    pub width: u32,
    pub height: u32,
    pub duration_seconds: f64,
    /// Container bitrate in bits per second, 0 when unknown
    pub bitrate: u64,
    pub codec_name: String,
    pub frame_rate: f64,
}

/// Probe a file with ffprobe, killing it after `timeout`
pub fn probe(ffprobe: &Path, path: &Path, timeout: Duration) -> Result<MediaDescriptor, ProbeError> {
    run_probe(ffprobe, path, timeout, || false)
}

/// [`probe`] that also kills ffprobe as soon as `stop` is requested
pub fn probe_with_stop(
    ffprobe: &Path,
    path: &Path,
    timeout: Duration,
    stop: &StopSignal,
) -> Result<MediaDescriptor, ProbeError> {
    run_probe(ffprobe, path, timeout, || stop.is_stop_requested())
}

fn run_probe(
    ffprobe: &Path,
    path: &Path,
    timeout: Duration,
    cancelled: impl Fn() -> bool,
) -> Result<MediaDescriptor, ProbeError> {
    let mut cmd = Command::new(ffprobe);
    cmd.args([
        "-v",
        "quiet",
        "-print_format",
        "json",
        "-show_format",
        "-show_streams",
    ])
    .arg(path);

    let output = run_until(&mut cmd, timeout, cancelled).map_err(|e| match e {
        RunError::Launch { source, .. } | RunError::Io { source, .. } => ProbeError::Launch(source),
        RunError::Timeout { limit, .. } => ProbeError::Timeout(limit),
        RunError::Cancelled { .. } => ProbeError::Cancelled,
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !output.status.success() || stdout.trim().is_empty() {
        return Err(ProbeError::ToolFailure {
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    parse_probe_output(&stdout)
}

/// Parse ffprobe's JSON (`-show_format -show_streams`) into a descriptor
pub fn parse_probe_output(json_str: &str) -> Result<MediaDescriptor, ProbeError> {
    let json: Value = serde_json::from_str(json_str)
        .map_err(|e| ProbeError::MalformedOutput(format!("invalid JSON: {}", e)))?;

    let streams = json["streams"].as_array().map(Vec::as_slice).unwrap_or(&[]);
    let video_stream = streams
        .iter()
        .find(|s| s["codec_type"].as_str() == Some("video"))
        .ok_or(ProbeError::NoVideoStream)?;

    let width = dimension(video_stream, "width")?;
    let height = dimension(video_stream, "height")?;

    let frame_rate = video_stream["r_frame_rate"]
        .as_str()
        .map(parse_frame_rate)
        .unwrap_or(DEFAULT_FRAME_RATE);

    let codec_name = video_stream["codec_name"]
        .as_str()
        .unwrap_or("unknown")
        .to_string();

    // ffprobe reports both as strings
    let duration_seconds = json["format"]["duration"]
        .as_str()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or(0.0);
    let bitrate = json["format"]["bit_rate"]
        .as_str()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(0);

    Ok(MediaDescriptor {
        width,
        height,
        duration_seconds,
        bitrate,
        codec_name,
        frame_rate,
    })
}

fn dimension(stream: &Value, key: &str) -> Result<u32, ProbeError> {
    stream[key]
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .filter(|v| *v > 0)
        .ok_or_else(|| ProbeError::MalformedOutput(format!("missing or zero {}", key)))
}

/// Parse `"N/D"` or a plain number; anything unusable gives 30.0
pub fn parse_frame_rate(s: &str) -> f64 {
    let rate = match s.split_once('/') {
        Some((num, den)) => parse_fraction(num, den),
        None => s.trim().parse::<f64>().ok(),
    };
    rate.filter(|r| r.is_finite() && *r > 0.0)
        .unwrap_or(DEFAULT_FRAME_RATE)
}

fn parse_fraction(numerator: &str, denominator: &str) -> Option<f64> {
    let numerator: f64 = numerator.trim().parse().ok()?;
    let denominator: f64 = denominator.trim().parse().ok()?;

    if denominator == 0.0 {
        return None;
    }

    Some(numerator / denominator)
}
