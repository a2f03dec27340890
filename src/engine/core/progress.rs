use regex::Regex;
use std::sync::OnceLock;

/// One recognized progress reading from ffmpeg output
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSample {
    /// Position in the source, when the line carried a timestamp
    pub current_seconds: Option<f64>,
    /// Frames written, when the line only carried a frame counter
    pub frames: Option<u64>,
    pub percent: f64,
}

impl ProgressSample {
    /// Human-readable form: `HH:MM:SS.fff` or "N frames processed"
    pub fn display(&self) -> String {
        match (self.current_seconds, self.frames) {
            (Some(secs), _) => format_timestamp(secs),
            (None, Some(frames)) => format!("{} frames processed", frames),
            (None, None) => String::new(),
        }
    }
}

fn out_time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"out_time_ms=(\d+)").expect("valid regex"))
}

fn time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Anchored on start or whitespace so `out_time=` is not mistaken for `time=`
    RE.get_or_init(|| Regex::new(r"(?:^|\s)time=(\d+):(\d+):(\d+(?:\.\d+)?)").expect("valid regex"))
}

fn frame_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"frame=\s*(\d+)").expect("valid regex"))
}

/// Parse one line of ffmpeg output
///
/// Recognizes, in order of preference, the `out_time_ms=` counter (microseconds,
/// despite the name), a `time=HH:MM:SS.fff` stamp, and a bare `frame=` counter.
/// Returns `None` for anything else.
pub fn parse_progress_line(line: &str, total_duration: Option<f64>) -> Option<ProgressSample> {
    if let Some(caps) = out_time_re().captures(line) {
        let micros: u64 = caps[1].parse().ok()?;
        let current = micros as f64 / 1_000_000.0;
        return Some(ProgressSample {
            current_seconds: Some(current),
            frames: None,
            percent: percent_of(current, total_duration),
        });
    }

    if let Some(caps) = time_re().captures(line) {
        let hours: f64 = caps[1].parse().ok()?;
        let minutes: f64 = caps[2].parse().ok()?;
        let seconds: f64 = caps[3].parse().ok()?;
        let current = hours * 3600.0 + minutes * 60.0 + seconds;
        return Some(ProgressSample {
            current_seconds: Some(current),
            frames: None,
            percent: percent_of(current, total_duration),
        });
    }

    if let Some(caps) = frame_re().captures(line) {
        let frames: u64 = caps[1].parse().ok()?;
        return Some(ProgressSample {
            current_seconds: None,
            frames: Some(frames),
            percent: 0.0,
        });
    }

    None
}

/// Percent of `total` reached at `current`, clamped to 100; 0 when total is unknown
pub fn percent_of(current: f64, total: Option<f64>) -> f64 {
    match total {
        Some(total) if total > 0.0 => (current / total * 100.0).min(100.0),
        _ => 0.0,
    }
}

/// Format seconds as `HH:MM:SS.fff`
pub fn format_timestamp(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let hours = (seconds / 3600.0).floor() as u64;
    let minutes = ((seconds % 3600.0) / 60.0).floor() as u64;
    let secs = seconds % 60.0;
    format!("{:02}:{:02}:{:06.3}", hours, minutes, secs)
}

/// Format whole seconds as `HH:MM:SS`
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}
