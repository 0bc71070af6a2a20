//! Configuration errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while locating, reading, or checking the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config file at {}", .0.display())]
    NotFound(PathBuf),

    #[error("config syntax: {0}")]
    Syntax(String),

    #[error("config could not be serialized: {0}")]
    Serialize(String),

    #[error("invalid config: {0}")]
    Validation(String),

    #[error("unknown secret provider '{0}' (expected env, local, memory, vault, aws, azure or gcp)")]
    UnknownProvider(String),

    #[error("home directory not found; set VAULTKEEP_HOME")]
    NoHomeDir,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
