//! Configuration loading and discovery for `pipeworks.toml`
//!
//! ```toml
//! [builder]
//! executable = "/opt/monogame/mgcb"
//! args = []
//! search_paths = ["", "tools", "../tools"]
//! launch_debugger = false
//!
//! [watcher]
//! enabled = true
//! interval_ms = 500
//!
//! [include]
//! duplicates = "skip"   # or "replace"
//!
//! [templates]
//! global_dir = "/usr/share/pipeworks/templates"
//!
//! [history]
//! max_recent = 10
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actions::DuplicatePolicy;

/// Configuration file name.
pub const CONFIG_FILE: &str = "pipeworks.toml";

/// Directory name under the user config directory.
pub const APP_DIR: &str = "pipeworks";

/// Configuration loading error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse pipeworks.toml: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// Where and how to run the build tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Explicit build tool path; searched for when unset.
    pub executable: Option<PathBuf>,

    /// Arguments placed before the generated ones (e.g. `["mgcb.dll"]` with `dotnet`).
    pub args: Vec<String>,

    /// Directories, relative to the running executable, searched for the tool.
    pub search_paths: Vec<PathBuf>,

    /// Pass `/launchdebugger` to builds.
    pub launch_debugger: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            executable: None,
            args: Vec::new(),
            search_paths: vec![PathBuf::new(), PathBuf::from("tools"), PathBuf::from("../tools")],
            launch_debugger: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    pub enabled: bool,
    pub interval_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 500,
        }
    }
}

impl WatcherConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncludeConfig {
    pub duplicates: DuplicatePolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplatesConfig {
    /// Templates shared by every project; defaults to `<config dir>/pipeworks/templates`.
    pub global_dir: Option<PathBuf>,
}

impl TemplatesConfig {
    pub fn global_dir(&self) -> Option<PathBuf> {
        self.global_dir
            .clone()
            .or_else(|| dirs::config_dir().map(|d| d.join(APP_DIR).join("templates")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub max_recent: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_recent: 10 }
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipeworksConfig {
    pub builder: BuilderConfig,
    pub watcher: WatcherConfig,
    pub include: IncludeConfig,
    pub templates: TemplatesConfig,
    pub history: HistoryConfig,
}

impl PipeworksConfig {
    /// Problems that make the configuration unusable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.watcher.interval_ms == 0 {
            errors.push("watcher.interval_ms must be greater than 0".to_string());
        }
        if self.history.max_recent == 0 {
            errors.push("history.max_recent must be greater than 0".to_string());
        }
        if let Some(exe) = &self.builder.executable {
            if exe.as_os_str().is_empty() {
                errors.push("builder.executable must not be empty".to_string());
            }
        }
        errors
    }
}

/// Find the configuration file.
///
/// Search order:
/// 1. Walk up from the current directory looking for `pipeworks.toml`
/// 2. `<user config dir>/pipeworks/pipeworks.toml`
pub fn find_config() -> Option<PathBuf> {
    if let Ok(cwd) = env::current_dir() {
        if let Some(path) = find_config_from(cwd) {
            return Some(path);
        }
    }

    let user_config = dirs::config_dir()?.join(APP_DIR).join(CONFIG_FILE);
    user_config.exists().then_some(user_config)
}

/// Walk up from `start` looking for `pipeworks.toml`.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from `path`, or from the discovered file, or defaults.
pub fn load_config(path: Option<&Path>) -> Result<PipeworksConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => {
            log::debug!("Loading configuration from {}", p.display());
            load_config_file(&p)
        }
        None => Ok(PipeworksConfig::default()),
    }
}

fn load_config_file(path: &Path) -> Result<PipeworksConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: PipeworksConfig = toml::from_str(&contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors));
    }

    Ok(config)
}
