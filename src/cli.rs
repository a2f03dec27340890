use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "reheight")]
#[command(
    about = "Re-encode 4K/5K/8K videos to their canonical height",
    long_about = "Re-encode videos whose width is 3840, 5120 or 7680 to 2160, 2880 or 4320 \
                  pixels high. Hardware encoders (NVENC, AMF, QuickSync) are tried first when \
                  available; software x264 is the fallback."
)]
pub struct Cli {
    /// Video files or directories (directories are scanned recursively)
    #[arg(value_name = "PATHS")]
    pub paths: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Use software encoding only (overrides config)
    #[arg(long, global = true)]
    pub no_gpu: bool,

    /// Replace the source files instead of writing <name>_resized copies (overrides config)
    #[arg(long)]
    pub overwrite: bool,

    /// Suffix for converted files (overrides config)
    #[arg(long, value_name = "SUFFIX", value_parser = parse_suffix)]
    pub suffix: Option<String>,

    /// Print debug diagnostics to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check if ffmpeg and ffprobe are installed
    CheckFfmpeg,

    /// List the hardware H.264 encoders ffmpeg offers on this machine
    Encoders,

    /// Probe a video file and show how it would be classified
    Probe {
        /// Path to the video file
        file: PathBuf,
    },

    /// Show the ffmpeg commands that would be tried, without executing (dry run)
    Plan {
        /// Path to the video file
        file: PathBuf,
    },

    /// Show config status and location, or create default config if missing
    InitConfig,
}

fn parse_suffix(value: &str) -> Result<String, String> {
    if reheight::config::is_valid_suffix(value) {
        Ok(value.to_string())
    } else {
        Err("suffix must be non-empty and must not contain path separators".to_string())
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}
