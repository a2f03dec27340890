//! Batch height correction for 4K/5K/8K videos.
//!
//! Files whose width matches a known tier (3840, 5120, 7680) are re-encoded with
//! ffmpeg to the tier's canonical height (2160, 2880, 4320). Hardware encoders
//! (NVENC, AMF, QuickSync) are tried first when requested and available; software
//! x264 is always the last resort.
//!
//! The [`engine`] module is independent of any front end: a caller selects files on
//! an [`engine::ConversionSession`], starts it, and polls the event channel.

pub mod config;
pub mod engine;
