//! Resolution tiers and destination naming

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use super::core::DEFAULT_SUFFIX;

/// The widths this tool recognizes, each with its canonical height
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ResolutionTier {
    Uhd4k,
    Uhd5k,
    Uhd8k,
}

impl ResolutionTier {
    pub const ALL: [ResolutionTier; 3] = [Self::Uhd4k, Self::Uhd5k, Self::Uhd8k];

    pub fn width(&self) -> u32 {
        match self {
            Self::Uhd4k => 3840,
            Self::Uhd5k => 5120,
            Self::Uhd8k => 7680,
        }
    }

    pub fn target_height(&self) -> u32 {
        match self {
            Self::Uhd4k => 2160,
            Self::Uhd5k => 2880,
            Self::Uhd8k => 4320,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Uhd4k => "4K",
            Self::Uhd5k => "5K",
            Self::Uhd8k => "8K",
        }
    }

    pub fn from_width(width: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|tier| tier.width() == width)
    }
}

impl fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}x{})",
            self.label(),
            self.width(),
            self.target_height()
        )
    }
}

/// What to do with a source of a given size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Classification {
    /// Width matches no tier
    Unsupported,
    /// Width matches and the height is already the tier's
    AlreadyCorrect(ResolutionTier),
    /// Needs re-encoding to the tier's height
    NeedsResize(ResolutionTier),
}

pub fn classify(width: u32, height: u32) -> Classification {
    match ResolutionTier::from_width(width) {
        None => Classification::Unsupported,
        Some(tier) if tier.target_height() == height => Classification::AlreadyCorrect(tier),
        Some(tier) => Classification::NeedsResize(tier),
    }
}

/// Where the converted file goes
///
/// With `overwrite` the source itself; otherwise `<dir>/<stem><suffix><ext>`.
/// An empty suffix falls back to `_resized` so the source is never the target
/// unless overwriting was asked for.
pub fn destination_path(source: &Path, overwrite: bool, suffix: &str) -> PathBuf {
    if overwrite {
        return source.to_path_buf();
    }
    let suffix = if suffix.is_empty() { DEFAULT_SUFFIX } else { suffix };

    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = source
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    source.with_file_name(format!("{}{}{}", stem, suffix, ext))
}
