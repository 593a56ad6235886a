//! Error types for Asterisk Manager Interface operations.
//!
//! All fallible operations in this crate return [`AmiResult<T>`]. Errors fall
//! into two groups:
//!
//! - **Connection errors** ([`AmiError::is_connection_error`]): the TCP session
//!   is dead and the caller should reconnect.
//! - **Recoverable errors** ([`AmiError::is_recoverable`]): the action failed
//!   but the connection is still usable (e.g., timeout, `Response: Error`).

use crate::actions::OriginateError;
use thiserror::Error;

/// Result type alias for AMI operations
pub type AmiResult<T> = Result<T, AmiError>;

/// Comprehensive error types for AMI operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AmiError {
    /// IO error from underlying TCP operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection is not established or lost
    #[error("Not connected to Asterisk")]
    NotConnected,

    /// Login was rejected
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    /// Protocol error - invalid message format
    #[error("Protocol error: {message}")]
    ProtocolError { message: String },

    /// Action answered with `Response: Error`
    #[error("Command failed: {message}")]
    CommandFailed { message: String },

    /// Response status was neither success nor error.
    #[error("Unexpected response: {status}")]
    UnexpectedResponse { status: String },

    /// Timeout waiting for response
    #[error("Operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Buffer overflow - message too large
    #[error("Buffer overflow: message size {size} exceeds limit {limit}")]
    BufferOverflow { size: usize, limit: usize },

    /// Invalid header format
    #[error("Invalid header format: {header}")]
    InvalidHeader { header: String },

    /// Missing required header
    #[error("Missing required header: {header}")]
    MissingHeader { header: String },

    /// Connection closed by remote
    #[error("Connection closed by Asterisk")]
    ConnectionClosed,

    /// Liveness timeout expired
    #[error("No traffic from Asterisk for {interval_ms}ms")]
    HeartbeatExpired { interval_ms: u64 },

    /// Originate builder error
    #[error("Originate error: {0}")]
    Originate(#[from] OriginateError),
}

impl AmiError {
    pub fn protocol_error(message: impl Into<String>) -> Self {
        Self::ProtocolError {
            message: message.into(),
        }
    }

    pub fn auth_failed(reason: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            reason: reason.into(),
        }
    }

    /// `true` if the connection is still usable and the caller can retry.
    ///
    /// Recoverable: `Timeout`, `CommandFailed` and `UnexpectedResponse`.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AmiError::Timeout { .. }
                | AmiError::CommandFailed { .. }
                | AmiError::UnexpectedResponse { .. }
        )
    }

    /// `true` if the TCP session is dead and the caller should reconnect.
    ///
    /// Matches: `Io`, `NotConnected`, `ConnectionClosed`, `HeartbeatExpired`.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            AmiError::Io(_)
                | AmiError::NotConnected
                | AmiError::ConnectionClosed
                | AmiError::HeartbeatExpired { .. }
        )
    }
}
