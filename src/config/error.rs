//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse `{0}`: {1}")]
    Parse(PathBuf, String),

    #[error("Config validation error: {0}")]
    Invalid(String),
}
