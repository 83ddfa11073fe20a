//! Error types for the compositor core.
//!
//! Region algebra, dirty tracking and occlusion are total and never fail;
//! malformed input is normalized and logged instead. Only the host-facing
//! setup steps, loading configuration and installing the logger, can return
//! errors, and they do so through [`CoreError`].

use std::path::PathBuf;
use thiserror::Error;

/// The crate-level error type.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Loading or validating the configuration failed.
    #[error("Configuration Error: {0}")]
    Config(#[from] ConfigError),

    /// The global `tracing` subscriber could not be installed.
    #[error("Logging Initialization Failed: {0}")]
    LoggingInitialization(String),

    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),

    /// A caller passed a value the core cannot work with, such as a negative display size.
    #[error("Invalid Input: {0}")]
    InvalidInput(String),
}

/// Errors raised while reading, parsing or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file from {path:?}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
