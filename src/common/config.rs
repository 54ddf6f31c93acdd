use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub settings: Settings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seconds between enumeration passes of the list loop.
    pub window_list_poll_interval: f64,
    /// Seconds between ticks of the per-window state loop.
    pub window_state_poll_interval: f64,
    /// Seconds the enumerator yields between two applications.
    pub chunk_interval: f64,
    pub capture_snapshots: bool,
    pub taskbar: TaskbarSettings,
    pub filter: FilterSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            window_list_poll_interval: 2.0,
            window_state_poll_interval: 1.0,
            chunk_interval: 0.01,
            capture_snapshots: true,
            taskbar: TaskbarSettings::default(),
            filter: FilterSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskbarSettings {
    pub max_button_width: f64,
    pub button_height: f64,
    pub spacing: f64,
}

impl Default for TaskbarSettings {
    fn default() -> Self {
        Self {
            max_button_width: 220.0,
            button_height: 28.0,
            spacing: 4.0,
        }
    }
}

/// Exclusion predicates applied by the enumerator. These track host quirks,
/// so they are data rather than code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    /// Title of the one window owned by the host process that is still shown.
    pub console_window_title: Option<String>,
    /// Applications that expose a window-like parent object with no subrole.
    pub pseudo_window_bundle_ids: Vec<String>,
    /// Pseudo-application that owns the lock/login screen.
    pub login_bundle_id: String,
    pub exclude_title_patterns: Vec<String>,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            console_window_title: Some("Console".to_string()),
            pseudo_window_bundle_ids: vec!["com.apple.finder".to_string()],
            login_bundle_id: "com.apple.loginwindow".to_string(),
            exclude_title_patterns: Vec::new(),
        }
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("rift-taskbar").join("config.toml"))
    }

    pub fn read(path: &Path) -> Result<Config, ConfigError> {
        let buf = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        debug!(path = %path.display(), "loaded config file");
        Self::parse(&buf)
    }

    /// Reads `path` if it exists, otherwise falls back to defaults.
    pub fn read_or_default(path: &Path) -> Result<Config, ConfigError> {
        if path.exists() {
            Self::read(path)
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Ok(Config::default())
        }
    }

    pub fn parse(buf: &str) -> Result<Config, ConfigError> {
        let config: Config = toml::from_str(buf)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.settings;
        s.window_list_poll_interval()?;
        s.window_state_poll_interval()?;
        s.chunk_interval()?;
        if !(s.taskbar.max_button_width.is_finite() && s.taskbar.max_button_width > 0.0) {
            return Err(ConfigError::Invalid {
                field: "taskbar.max_button_width",
                reason: format!("must be positive, got {}", s.taskbar.max_button_width),
            });
        }
        self.settings.filter.title_patterns()?;
        Ok(())
    }
}

impl Settings {
    pub fn window_list_poll_interval(&self) -> Result<Duration, ConfigError> {
        interval("window_list_poll_interval", self.window_list_poll_interval)
    }

    pub fn window_state_poll_interval(&self) -> Result<Duration, ConfigError> {
        interval("window_state_poll_interval", self.window_state_poll_interval)
    }

    pub fn chunk_interval(&self) -> Result<Duration, ConfigError> {
        interval("chunk_interval", self.chunk_interval)
    }
}

impl FilterSettings {
    pub fn title_patterns(&self) -> Result<Vec<Regex>, ConfigError> {
        self.exclude_title_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|err| ConfigError::Invalid {
                    field: "filter.exclude_title_patterns",
                    reason: err.to_string(),
                })
            })
            .collect()
    }
}

fn interval(field: &'static str, secs: f64) -> Result<Duration, ConfigError> {
    let invalid = |detail: String| ConfigError::Invalid {
        field,
        reason: format!("interval must be a positive number of seconds, got {secs}: {detail}"),
    };
    let duration = Duration::try_from_secs_f64(secs).map_err(|err| invalid(err.to_string()))?;
    if duration.is_zero() {
        return Err(invalid("rounds to zero".to_string()));
    }
    Ok(duration)
}
