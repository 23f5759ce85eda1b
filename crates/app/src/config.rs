//! Console configuration
//!
//! Read from `--config <path>` or the platform config directory. A missing
//! file is not an error; every field has a default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use agora_core::SidePolicy;
use agora_net::{RoomConfig, DEFAULT_HTTP_BASE, DEFAULT_WS_URL};
use directories::ProjectDirs;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP origin serving `/api/rooms`
    pub http_base: String,
    pub ws_url: String,
    /// Generated `Guest-NNN` when absent
    pub display_name: Option<String>,
    pub side_policy: SidePolicy,
    pub fetch_argument_history: bool,
    pub connect_timeout_secs: u64,
    /// Used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http_base: DEFAULT_HTTP_BASE.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            display_name: None,
            side_policy: SidePolicy::Random,
            fetch_argument_history: true,
            connect_timeout_secs: 10,
            log_filter: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, or from the default location when `None`
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "agora", "agora").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn room_config(&self) -> RoomConfig {
        RoomConfig {
            side_policy: self.side_policy,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            ..RoomConfig::default()
        }
    }
}
