// Global configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::{DEFAULT_SUFFIX, EngineConfig, ToolPaths};

const APP_DIR: &str = "reheight";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// Explicit tool locations; unset means bundled `bin/` or `PATH`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffmpeg: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffprobe: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Try NVENC / AMF / QuickSync before software x264
    #[serde(default = "default_true_config")]
    pub gpu_enabled: bool,

    /// Replace the source instead of writing `<stem><suffix><ext>` next to it
    #[serde(default)]
    pub overwrite: bool,

    /// Inserted before the extension of converted files
    #[serde(default = "default_suffix")]
    pub suffix: String,

    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// How long a stopped encoder gets to exit before it is killed
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,

    /// Event polling interval of the console front end
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Append commands and outcomes to reheight.log in the config directory
    #[serde(default)]
    pub debug_log: bool,
}

fn default_true_config() -> bool {
    true
}

fn default_suffix() -> String {
    DEFAULT_SUFFIX.to_string()
}

fn default_probe_timeout_secs() -> u64 {
    60
}

fn default_kill_grace_ms() -> u64 {
    1000
}

fn default_poll_interval_ms() -> u64 {
    50
}

/// A suffix must be non-empty and stay inside the source's directory
pub fn is_valid_suffix(suffix: &str) -> bool {
    !suffix.is_empty() && !suffix.contains(['/', '\\'])
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            gpu_enabled: true,
            overwrite: false,
            suffix: default_suffix(),
            probe_timeout_secs: default_probe_timeout_secs(),
            kill_grace_ms: default_kill_grace_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            debug_log: false,
        }
    }
}

impl DefaultsConfig {
    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }

    /// Configured suffix, or `_resized` when it is empty or contains a path separator
    pub fn effective_suffix(&self) -> String {
        if is_valid_suffix(&self.suffix) {
            self.suffix.clone()
        } else {
            tracing::warn!(suffix = %self.suffix, "invalid suffix in config, using {}", DEFAULT_SUFFIX);
            default_suffix()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        // A zero interval would spin
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Config {
    /// Directory holding config.toml and the debug log
    pub fn config_dir() -> Result<PathBuf> {
        Ok(dirs::config_dir()
            .context("Could not determine config directory")?
            .join(APP_DIR))
    }

    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn debug_log_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("reheight.log"))
    }

    /// Load config from disk, or create default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();

            // A read-only config directory is not fatal
            if let Err(e) = config.save() {
                tracing::warn!("Could not create default config file: {:#}", e);
                eprintln!(
                    "Using built-in defaults. Run 'reheight init-config' to create a config file."
                );
            }

            Ok(config)
        }
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        Ok(config)
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(config_path, contents)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Engine settings with tool paths resolved
    pub fn engine_config(&self) -> EngineConfig {
        let debug_log = if self.defaults.debug_log {
            Self::debug_log_path().ok()
        } else {
            None
        };

        EngineConfig {
            tools: ToolPaths::resolve(self.tools.ffmpeg.as_deref(), self.tools.ffprobe.as_deref()),
            probe_timeout: Duration::from_secs(self.defaults.probe_timeout_secs),
            suffix: self.defaults.effective_suffix(),
            debug_log,
        }
    }
}
