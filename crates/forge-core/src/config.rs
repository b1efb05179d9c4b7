//! Configuration loading: environment variables override a TOML file, which
//! overrides compiled-in defaults.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to write config file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
}

fn dirs_or_home(xdg_var: &str, fallback_rel: &str) -> PathBuf {
    if let Ok(p) = std::env::var(xdg_var) {
        return PathBuf::from(p);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(fallback_rel)
}

pub fn config_dir() -> PathBuf {
    dirs_or_home("XDG_CONFIG_HOME", ".config").join("forge")
}

/// Resolves the config file path, honoring a `FORGE_CONFIG` override.
pub fn config_file_path() -> PathBuf {
    if let Ok(p) = std::env::var("FORGE_CONFIG") {
        return PathBuf::from(p);
    }
    config_dir().join("config.toml")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub bind_address: String,
    pub port: u16,
    pub listen_backlog: u32,
    pub status_port: u16,
    pub max_chunk_size: u64,
    pub chunk_count_hint: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            listen_backlog: 1000,
            status_port: 8090,
            max_chunk_size: 200 * 1024,
            chunk_count_hint: 1,
        }
    }
}

impl CoordinatorConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let mut cfg = Self::from_file_or_default()?;
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    fn from_file_or_default() -> Result<Self, ConfigError> {
        let path = config_file_path();
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                toml::from_str(&contents).map_err(|source| ConfigError::ParseFailed { path, source })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::ReadFailed { path, source }),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("FORGE_BIND_ADDRESS") {
            self.bind_address = v;
        }
        if let Ok(v) = std::env::var("FORGE_PORT") {
            if let Ok(p) = v.parse() {
                self.port = p;
            }
        }
        if let Ok(v) = std::env::var("FORGE_STATUS_PORT") {
            if let Ok(p) = v.parse() {
                self.status_port = p;
            }
        }
        if let Ok(v) = std::env::var("FORGE_MAX_CHUNK_SIZE") {
            if let Ok(n) = v.parse() {
                self.max_chunk_size = n;
            }
        }
    }

    pub fn write_default_if_missing() -> Result<(), ConfigError> {
        let path = config_file_path();
        if path.exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let contents = toml::to_string_pretty(&Self::default())?;
        std::fs::write(&path, contents).map_err(|source| ConfigError::WriteFailed { path, source })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerConfig {
    pub coordinator_address: String,
    pub coordinator_port: u16,
    /// Overrides the detected logical core count when non-zero.
    pub core_count_override: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            coordinator_address: "127.0.0.1".to_string(),
            coordinator_port: 8080,
            core_count_override: 0,
        }
    }
}

impl WorkerConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let mut cfg = Self::from_file_or_default()?;
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    fn from_file_or_default() -> Result<Self, ConfigError> {
        let path = config_file_path();
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                toml::from_str(&contents).map_err(|source| ConfigError::ParseFailed { path, source })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::ReadFailed { path, source }),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("FORGE_COORDINATOR_ADDRESS") {
            self.coordinator_address = v;
        }
        if let Ok(v) = std::env::var("FORGE_COORDINATOR_PORT") {
            if let Ok(p) = v.parse() {
                self.coordinator_port = p;
            }
        }
        if let Ok(v) = std::env::var("FORGE_CORE_COUNT") {
            if let Ok(n) = v.parse() {
                self.core_count_override = n;
            }
        }
    }
}
