//! Error types for the remote control-plane boundary.

use thiserror::Error;

/// Errors that can occur while talking to the remote trace/control service.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure (connection refused, DNS, broken pipe, ...)
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote answered with a non-success HTTP status
    #[error("unexpected status code: {0}")]
    Status(u16),

    /// Response body could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// Response decoded but is missing fields the engine depends on
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// Operation timed out
    #[error("timeout after {0}ms")]
    Timeout(u64),
}

impl ApiError {
    /// Creates a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Creates a decode error.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}
