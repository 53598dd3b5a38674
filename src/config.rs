use crate::session::DEFAULT_SESSION_KEY;
use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// A validation error in the configuration
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]: {}", self.field, self.message)
    }
}

/// Where and under which key the session is persisted
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct StorageConfig {
    /// Storage file; defaults to ~/.vxfb/local_storage.json
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub session_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct LogConfig {
    /// trace, debug, info, warn or error
    #[serde(default)]
    pub level: Option<String>,
}

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from default paths
    /// Priority: local (.vxfb/config.local.toml) > project (.vxfb/config.toml) > user (~/.vxfb/config.toml)
    pub fn load() -> Result<Self> {
        let mut layers = Vec::new();
        if let Some(home) = dirs::home_dir() {
            layers.push(home.join(".vxfb").join("config.toml"));
        }
        layers.push(Path::new(".vxfb").join("config.toml"));
        // Should be gitignored
        layers.push(Path::new(".vxfb").join("config.local.toml"));

        Self::load_layers(&layers)
    }

    /// Merge the existing files among `layers`, later files taking priority
    pub fn load_layers(layers: &[PathBuf]) -> Result<Self> {
        let mut config = Self::default();
        for path in layers {
            if path.exists() {
                config.merge(Self::load_from(path)?);
            }
        }
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Merge another config into this one (other takes priority for every
    /// value it sets)
    pub fn merge(&mut self, other: Config) {
        if other.storage.path.is_some() {
            self.storage.path = other.storage.path;
        }
        if other.storage.session_key.is_some() {
            self.storage.session_key = other.storage.session_key;
        }
        if other.log.level.is_some() {
            self.log.level = other.log.level;
        }
    }

    pub fn session_key(&self) -> &str {
        self.storage
            .session_key
            .as_deref()
            .unwrap_or(DEFAULT_SESSION_KEY)
    }

    pub fn log_level(&self) -> Option<tracing::Level> {
        self.log
            .level
            .as_deref()
            .and_then(|level| tracing::Level::from_str(level).ok())
    }

    /// Validate configuration and return any errors found
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Some(key) = &self.storage.session_key {
            if key.trim().is_empty() {
                errors.push(ValidationError {
                    field: "storage.session_key".to_string(),
                    message: "Must not be empty".to_string(),
                });
            }
        }

        if let Some(path) = &self.storage.path {
            if path.as_os_str().is_empty() {
                errors.push(ValidationError {
                    field: "storage.path".to_string(),
                    message: "Must not be empty".to_string(),
                });
            } else if path.is_dir() {
                errors.push(ValidationError {
                    field: "storage.path".to_string(),
                    message: format!("'{}' is a directory", path.display()),
                });
            }
        }

        if let Some(level) = &self.log.level {
            if tracing::Level::from_str(level).is_err() {
                errors.push(ValidationError {
                    field: "log.level".to_string(),
                    message: format!(
                        "Invalid log level '{}', expected trace|debug|info|warn|error",
                        level
                    ),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
