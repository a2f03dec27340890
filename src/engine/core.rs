mod engine;
mod ffmpeg_cmd;
mod ffmpeg_info;
mod log;
pub mod process;
mod progress;
mod types;

pub use engine::ConversionEngine;
pub use ffmpeg_cmd::{build_encode_cmd, format_ffmpeg_cmd, scale_filter};
pub use ffmpeg_info::{ToolPaths, ffmpeg_version, ffprobe_version};
pub use log::write_debug_log;
pub use process::{DEFAULT_KILL_GRACE, StopSignal};
pub use progress::{
    ProgressSample, format_duration, format_timestamp, parse_progress_line, percent_of,
};
pub use types::{
    ConversionEvent, ConversionJob, ConversionOutcome, DEFAULT_PROBE_TIMEOUT, DEFAULT_SUFFIX,
    EngineConfig, EventSink, LogLine, ProgressEvent, display_name,
};
