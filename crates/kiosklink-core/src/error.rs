//! Shared error type across kiosklink crates.

use thiserror::Error;

/// Stable error codes (used in logs, metrics labels and tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Request issued while the channel was not open.
    NotConnected,
    /// Request expired before a response arrived.
    Timeout,
    /// The owning connection closed while the request was pending.
    ConnectionClosed,
    /// Socket-level failure (connect, read, write).
    Transport,
    /// Malformed frame or payload.
    Decode,
    /// Message name outside the channel vocabulary.
    UnknownMessage,
    /// Unsupported camera-frame lane version.
    UnsupportedVersion,
    /// Invalid configuration.
    Config,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NotConnected => "NOT_CONNECTED",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::ConnectionClosed => "CONNECTION_CLOSED",
            ErrorCode::Transport => "TRANSPORT",
            ErrorCode::Decode => "DECODE",
            ErrorCode::UnknownMessage => "UNKNOWN_MESSAGE",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Config => "CONFIG",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, KioskError>;

/// Unified error type used by core and client.
///
/// `Clone` so one connect outcome can be handed to every caller awaiting the
/// same in-flight attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KioskError {
    #[error("not connected")]
    NotConnected,
    #[error("request timed out")]
    Timeout,
    #[error("connection closed")]
    ConnectionClosed,
    #[error("transport: {0}")]
    Transport(String),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("unknown message: {0}")]
    UnknownMessage(String),
    #[error("unsupported frame version")]
    UnsupportedVersion,
    #[error("invalid config: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl KioskError {
    /// Map to a stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            KioskError::NotConnected => ErrorCode::NotConnected,
            KioskError::Timeout => ErrorCode::Timeout,
            KioskError::ConnectionClosed => ErrorCode::ConnectionClosed,
            KioskError::Transport(_) => ErrorCode::Transport,
            KioskError::Decode(_) => ErrorCode::Decode,
            KioskError::UnknownMessage(_) => ErrorCode::UnknownMessage,
            KioskError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            KioskError::Config(_) => ErrorCode::Config,
            KioskError::Internal(_) => ErrorCode::Internal,
        }
    }
}
