pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "CONVERGE_CONFIG_PATH";
pub const API_URL_ENV: &str = "CONVERGE_API_URL";
pub const DEFAULT_TOKEN_ENV: &str = "CONVERGE_API_TOKEN";

const LOCAL_CANDIDATES: [&str; 2] = ["converge.yaml", ".converge.yaml"];

/// Top-level settings file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    pub poll: PollConfig,
}

/// Remote control-plane connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Base URL of the REST API, e.g. `https://api.example.com/v1`
    pub base_url: Option<String>,

    /// Name of the environment variable that holds the bearer token
    pub token_env: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            token_env: DEFAULT_TOKEN_ENV.to_string(),
        }
    }
}

impl ApiSettings {
    /// Read the bearer token from the configured environment variable
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env).ok().filter(|t| !t.is_empty())
    }
}

/// Convergence polling budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_secs: u64,
    pub timeout_secs: u64,
    pub max_probe_errors: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 4,
            timeout_secs: 60,
            max_probe_errors: 3,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Settings {
    /// Reject budgets the poller cannot honour
    pub fn validate(&self) -> Result<()> {
        let poll = &self.poll;
        if poll.interval_secs == 0 {
            return Err(ConfigError::Invalid("poll.interval_secs must be greater than 0".into()));
        }
        if poll.timeout_secs == 0 {
            return Err(ConfigError::Invalid("poll.timeout_secs must be greater than 0".into()));
        }
        if poll.max_probe_errors == 0 {
            return Err(ConfigError::Invalid(
                "poll.max_probe_errors must be greater than 0".into(),
            ));
        }
        if poll.interval_secs > poll.timeout_secs {
            return Err(ConfigError::Invalid(format!(
                "poll.interval_secs ({}) must not exceed poll.timeout_secs ({})",
                poll.interval_secs, poll.timeout_secs
            )));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.is_empty() {
                tracing::debug!("{} overrides api.base_url", API_URL_ENV);
                self.api.base_url = Some(url);
            }
        }
    }
}

/// Get the global config directory (`~/.config/converge`)
pub fn global_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("converge"))
}

/// Locate the settings file
///
/// Search order:
/// 1. `CONVERGE_CONFIG_PATH` environment variable
/// 2. current directory: `converge.yaml`, `.converge.yaml`
/// 3. `~/.config/converge/config.yaml`
pub fn find_config_file() -> Option<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Some(path);
        }
        tracing::warn!("{} points to a missing file: {}", CONFIG_PATH_ENV, path.display());
    }

    if let Ok(current_dir) = std::env::current_dir() {
        for filename in &LOCAL_CANDIDATES {
            let path = current_dir.join(filename);
            if path.exists() {
                return Some(path);
            }
        }
    }

    global_config_dir()
        .map(|dir| dir.join("config.yaml"))
        .filter(|path| path.exists())
}

/// Parse a settings file without env overrides
pub fn load_from(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load settings from an explicit path or by discovery
///
/// An explicit path must exist. Without one, a missing file means defaults.
pub fn load(explicit: Option<&Path>) -> Result<Settings> {
    let mut settings = match explicit {
        Some(path) if !path.exists() => {
            return Err(ConfigError::ConfigFileNotFound(path.to_path_buf()));
        }
        Some(path) => load_from(path)?,
        None => match find_config_file() {
            Some(path) => {
                tracing::debug!("Loading config from {}", path.display());
                load_from(&path)?
            }
            None => {
                tracing::debug!("No config file found, using defaults");
                Settings::default()
            }
        },
    };

    settings.apply_env_overrides();
    settings.validate()?;
    Ok(settings)
}
