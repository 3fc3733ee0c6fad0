//! Runtime error types.

use thiserror::Error;

use bronze_core::TransportError;

use crate::config::ConfigError;

/// Errors that can occur while building or running the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The initial connection could not be established.
    #[error("Failed to connect: {0}")]
    Connect(#[source] TransportError),

    /// Reconnection gave up while running.
    #[error("Connection lost: {0}")]
    ConnectionLost(#[source] TransportError),

    #[error("Runtime is already running")]
    AlreadyStarted,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
