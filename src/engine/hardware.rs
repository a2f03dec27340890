//! Hardware encoder detection and resolution ceilings

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::engine::core::process::run_with_timeout;

/// How long `ffmpeg -encoders` may take before we give up on hardware
pub const CAPABILITY_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Encoder kinds
// ============================================================================

/// Supported H.264 encoders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum EncoderKind {
    SoftwareX264, // libx264
    NvidiaNvenc,  // h264_nvenc
    AmdAmf,       // h264_amf
    IntelQsv,     // h264_qsv
}

impl EncoderKind {
    /// Hardware encoders in the order they are tried
    pub const HARDWARE_PRIORITY: [EncoderKind; 3] = [
        EncoderKind::NvidiaNvenc,
        EncoderKind::AmdAmf,
        EncoderKind::IntelQsv,
    ];

    /// Get the FFmpeg encoder name
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            Self::SoftwareX264 => "libx264",
            Self::NvidiaNvenc => "h264_nvenc",
            Self::AmdAmf => "h264_amf",
            Self::IntelQsv => "h264_qsv",
        }
    }

    /// Check if this is a hardware encoder
    pub fn is_hardware(&self) -> bool {
        !matches!(self, Self::SoftwareX264)
    }

    /// Get user-friendly display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::SoftwareX264 => "Software (libx264)",
            Self::NvidiaNvenc => "NVIDIA NVENC",
            Self::AmdAmf => "AMD AMF",
            Self::IntelQsv => "Intel QuickSync",
        }
    }

    /// Largest frame this encoder is trusted with, `None` for unbounded
    ///
    /// NVENC is capped just above 4K: larger frames were unstable in practice.
    pub fn max_resolution(&self) -> Option<(u32, u32)> {
        match self {
            Self::SoftwareX264 => None,
            Self::NvidiaNvenc => Some((4096, 2304)),
            Self::AmdAmf | Self::IntelQsv => Some((7680, 4320)),
        }
    }

    pub fn supports(&self, width: u32, height: u32) -> bool {
        match self.max_resolution() {
            Some((max_w, max_h)) => width <= max_w && height <= max_h,
            None => true,
        }
    }
}

// ============================================================================
// Detection
// ============================================================================

/// Hardware encoders reported by ffmpeg, iterated in priority order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncoderSet {
    kinds: Vec<EncoderKind>,
}

impl EncoderSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: EncoderKind) {
        if !kind.is_hardware() || self.kinds.contains(&kind) {
            return;
        }
        self.kinds.push(kind);
        self.kinds.sort();
    }

    pub fn contains(&self, kind: EncoderKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = EncoderKind> + '_ {
        self.kinds.iter().copied()
    }

    /// Comma-separated display names, or "none"
    pub fn describe(&self) -> String {
        if self.is_empty() {
            return "none".to_string();
        }
        self.iter()
            .map(|k| k.display_name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromIterator<EncoderKind> for EncoderSet {
    fn from_iter<I: IntoIterator<Item = EncoderKind>>(iter: I) -> Self {
        let mut set = EncoderSet::new();
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

/// Find the hardware encoders named in `ffmpeg -encoders` output
pub fn parse_encoder_list(output: &str) -> EncoderSet {
    EncoderKind::HARDWARE_PRIORITY
        .into_iter()
        .filter(|kind| output.contains(kind.ffmpeg_name()))
        .collect()
}

/// Ask ffmpeg which hardware encoders it was built with
///
/// Not cached: drivers come and go, so callers query once per batch. Any failure
/// yields an empty set, software encoding is always available regardless.
pub fn detect(ffmpeg: &Path) -> EncoderSet {
    detect_with_timeout(ffmpeg, CAPABILITY_QUERY_TIMEOUT)
}

pub fn detect_with_timeout(ffmpeg: &Path, timeout: Duration) -> EncoderSet {
    let mut cmd = Command::new(ffmpeg);
    cmd.args(["-hide_banner", "-encoders"]);

    match run_with_timeout(&mut cmd, timeout) {
        Ok(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let set = parse_encoder_list(&stdout);
            debug!(encoders = %set.describe(), "hardware encoder query finished");
            set
        }
        Err(e) => {
            warn!(error = %e, ffmpeg = %ffmpeg.display(), "hardware encoder query failed");
            EncoderSet::new()
        }
    }
}
