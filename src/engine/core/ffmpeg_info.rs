use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Locations of the ffmpeg and ffprobe executables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl ToolPaths {
    /// Resolve both tools: explicit path, then a `bin/` directory shipped next
    /// to the executable, then whatever `PATH` provides
    pub fn resolve(ffmpeg: Option<&Path>, ffprobe: Option<&Path>) -> Self {
        let bundled = bundled_bin_dir();
        Self {
            ffmpeg: resolve_tool("ffmpeg", ffmpeg, bundled.as_deref()),
            ffprobe: resolve_tool("ffprobe", ffprobe, bundled.as_deref()),
        }
    }
}

fn bundled_bin_dir() -> Option<PathBuf> {
    let exe = env::current_exe().ok()?;
    let dir = exe.parent()?.join("bin");
    dir.is_dir().then_some(dir)
}

fn resolve_tool(name: &str, explicit: Option<&Path>, bundled: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Some(dir) = bundled {
        let candidate = dir.join(format!("{}{}", name, env::consts::EXE_SUFFIX));
        if candidate.is_file() {
            return candidate;
        }
    }
    PathBuf::from(name)
}

/// Check if ffmpeg is available and return its version
pub fn ffmpeg_version(ffmpeg: &Path) -> Result<String> {
    tool_version(ffmpeg, "ffmpeg")
}

/// Check if ffprobe is available and return its version
pub fn ffprobe_version(ffprobe: &Path) -> Result<String> {
    tool_version(ffprobe, "ffprobe")
}

fn tool_version(path: &Path, name: &str) -> Result<String> {
    let output = Command::new(path)
        .arg("-version")
        .output()
        .with_context(|| {
            format!(
                "Failed to execute {} ({}). Is it installed and in PATH?",
                name,
                path.display()
            )
        })?;

    if !output.status.success() {
        anyhow::bail!("{} command failed with status: {}", name, output.status);
    }

    let version_output = String::from_utf8_lossy(&output.stdout);
    let first_line = version_output.lines().next().unwrap_or("Unknown version");

    Ok(first_line.to_string())
}
