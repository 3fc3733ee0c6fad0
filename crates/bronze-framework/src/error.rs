//! Error types for the bronze framework.

use thiserror::Error;

use bronze_onebot::EventType;

/// Errors raised while building a handler context.
#[derive(Debug, Clone, Error)]
pub enum ContextError {
    /// A message context was requested for an event that carries no
    /// private or group message.
    #[error("event '{0}' is not a private or group message")]
    NotAMessage(EventType),
}

/// Result type for context construction.
pub type ContextResult<T> = Result<T, ContextError>;
