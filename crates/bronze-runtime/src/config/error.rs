//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// The file extension is unknown or its format feature is disabled.
    #[error("Unsupported or disabled configuration file format: .{0}")]
    UnsupportedFormat(String),

    /// The merged sources could not be extracted into the schema.
    #[error("Failed to extract configuration: {0}")]
    Extract(String),

    /// Invalid configuration value.
    #[error("Invalid configuration: {message}")]
    Validation { message: String },

    /// Invalid URL format.
    #[error("Invalid URL: {url} - {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl ConfigError {
    /// Creates a validation error with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(error: figment::Error) -> Self {
        Self::Extract(error.to_string())
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
