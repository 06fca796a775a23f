//! Installation of the `tracing` subscriber.

use tracing_subscriber::{fmt, EnvFilter};

use crate::db::{Config, ConfigError};
use crate::types::{DbError, Result};

/// Installs a global fmt subscriber filtered by `level` (any `EnvFilter`
/// directive, e.g. `"info"` or `"rowshape=debug"`).
///
/// Fails when the directive does not parse or a subscriber is already set.
pub fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level).map_err(|source| ConfigError::LogLevel {
        directive: level.to_string(),
        source,
    })?;
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|_| DbError::Invalid("logging already initialized"))
}

/// Installs the subscriber using [`Config::log_level`].
pub fn init_from_config(config: &Config) -> Result<()> {
    init_logging(&config.log_level)
}
