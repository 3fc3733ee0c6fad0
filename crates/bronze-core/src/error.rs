//! Error types shared by every bronze crate.
//!
//! Errors are split by the layer that produces them: the socket layer raises
//! [`TransportError`], inbound frame parsing raises [`DecodeError`], and remote
//! action calls raise [`ApiError`].

use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors that can occur in transport operations.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection attempt failed.
    #[error("connection failed: {url} - {reason}")]
    ConnectionFailed {
        /// The URL that failed to connect.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// The remote side closed the connection.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for closure.
        reason: String,
    },

    /// A send was attempted while the link is not up.
    #[error("transport is not connected")]
    NotConnected,

    /// Writing a frame failed.
    #[error("failed to send frame: {0}")]
    SendFailed(String),

    /// Reconnection gave up after exhausting the retry budget.
    #[error("transport lost after {attempts} reconnect attempts: {reason}")]
    Lost {
        /// Number of reconnect attempts made.
        attempts: u32,
        /// The last failure observed.
        reason: String,
    },

    /// The connection request could not be built (bad URL, bad header).
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// Decode Errors
// =============================================================================

/// Errors produced while classifying or decoding an inbound frame.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    /// The frame is not valid JSON.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// The frame is JSON but is neither a call result nor an event.
    #[error("frame has neither `echo` nor `post_type`")]
    Unclassified,

    /// The frame carried a discriminator but its payload did not fit the shape.
    #[error("invalid {kind} payload: {reason}")]
    InvalidPayload {
        /// What was being decoded (`event`, `call result`, ...).
        kind: &'static str,
        /// Underlying serde message.
        reason: String,
    },
}

// =============================================================================
// API Errors
// =============================================================================

/// Error type for remote action calls.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The connection is down or was stopped while the call was pending.
    #[error("bot is not connected")]
    NotConnected,

    /// No result arrived before the deadline.
    #[error("API call `{action}` timed out")]
    Timeout {
        /// The action that timed out.
        action: String,
    },

    /// The remote side answered with a non-zero retcode.
    #[error("API error ({retcode}): {message}")]
    Failed {
        /// OneBot return code.
        retcode: i64,
        /// Human-readable reason (`message` or `wording`).
        message: String,
    },

    /// Failed to serialize params or deserialize the result data.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Transport error.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for frame decoding.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Result type for API calls.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_from_transport() {
        let err: ApiError = TransportError::NotConnected.into();
        assert!(matches!(err, ApiError::Transport(TransportError::NotConnected)));
        assert_eq!(err.to_string(), "transport is not connected");
    }

    #[test]
    fn test_failed_display() {
        let err = ApiError::Failed {
            retcode: 100,
            message: "bad params".into(),
        };
        assert_eq!(err.to_string(), "API error (100): bad params");
    }
}
