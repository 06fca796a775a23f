//! Runtime configuration loaded from TOML.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default number of rows fetched per portion.
pub const DEFAULT_PORTION_SIZE: usize = 100;

/// Settings of the SQLite driver.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SqliteSection {
    /// Database file; `None` opens private in-memory databases.
    pub path: Option<PathBuf>,
    /// How long a statement waits on a locked database.
    pub busy_timeout_ms: u64,
}

impl Default for SqliteSection {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 5_000,
        }
    }
}

/// Client-side settings shared by the facade, its sessions and runners.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Rows per portion used by new query runners.
    pub default_portion_size: usize,
    /// Filter directive passed to the logging subscriber.
    pub log_level: String,
    /// SQLite driver settings.
    pub sqlite: SqliteSection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_portion_size: DEFAULT_PORTION_SIZE,
            log_level: "info".to_string(),
            sqlite: SqliteSection::default(),
        }
    }
}

impl Config {
    /// Small portions for consumers that stream results pack by pack.
    pub fn streaming() -> Self {
        Self {
            default_portion_size: 16,
            ..Self::default()
        }
    }

    /// Large portions for bulk exports.
    pub fn bulk() -> Self {
        Self {
            default_portion_size: 10_000,
            ..Self::default()
        }
    }

    /// Parses a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(contents).map_err(|source| ConfigError::Parse { source })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Renders the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|source| ConfigError::Serialize { source })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_portion_size == 0 {
            return Err(ConfigError::Invalid {
                key: "default_portion_size",
                reason: "must be positive",
            });
        }
        Ok(())
    }
}

/// Errors raised while loading a [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The document is not valid TOML for this schema.
    #[error("failed to parse config: {source}")]
    Parse {
        /// Underlying error.
        source: toml::de::Error,
    },
    /// The configuration could not be rendered.
    #[error("failed to serialize config: {source}")]
    Serialize {
        /// Underlying error.
        source: toml::ser::Error,
    },
    /// The log level is not a valid filter directive.
    #[error("invalid log level '{directive}': {source}")]
    LogLevel {
        /// Directive as written.
        directive: String,
        /// Underlying error.
        source: tracing_subscriber::filter::ParseError,
    },
    /// A value is out of range.
    #[error("config key '{key}' {reason}")]
    Invalid {
        /// Offending key.
        key: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}
