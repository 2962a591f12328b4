//! Project configuration file support for logsleuth.
//!
//! Loads configuration from `logsleuth.toml` in the working directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// The config file name
pub const CONFIG_FILE_NAME: &str = "logsleuth.toml";

/// Log file searched when neither `--file` nor `log_file` is given.
pub const DEFAULT_LOG_FILE: &str = "consolidated_logs/latest.log";

/// Project-level configuration loaded from `logsleuth.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Primary log file to search
    pub log_file: Option<PathBuf>,
    /// Additional default locations, skipped when missing
    #[serde(default)]
    pub fallback_logs: Vec<PathBuf>,
    /// Session registry directory
    pub sessions_dir: Option<PathBuf>,
    /// Copy search results to the clipboard
    pub clipboard: Option<bool>,
    /// Include `[ERROR]` entries regardless of pattern
    pub always_include_errors: Option<bool>,
    /// Stop scanning after this many lines per file
    pub max_lines: Option<usize>,
    /// Stop scanning after this many bytes per file
    pub max_bytes: Option<u64>,
}

impl ProjectConfig {
    /// Load configuration from the working directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        let config_path = working_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(Some(config))
    }

    /// Default search set: primary log file then fallbacks, resolved against
    /// the working directory.
    pub fn default_log_paths(&self, working_dir: &Path) -> Vec<PathBuf> {
        let primary = self
            .log_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));

        std::iter::once(primary)
            .chain(self.fallback_logs.iter().cloned())
            .map(|p| resolve(working_dir, p))
            .collect()
    }

    /// Configured sessions directory, resolved against the working directory.
    pub fn sessions_dir(&self, working_dir: &Path) -> Option<PathBuf> {
        self.sessions_dir
            .clone()
            .map(|p| resolve(working_dir, p))
    }

    pub fn clipboard_enabled(&self) -> bool {
        self.clipboard.unwrap_or(true)
    }

    pub fn include_errors(&self) -> bool {
        self.always_include_errors.unwrap_or(true)
    }
}

/// Join relative paths onto the working directory.
pub fn resolve(working_dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        working_dir.join(path)
    }
}
