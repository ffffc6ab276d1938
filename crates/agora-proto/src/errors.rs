//! Error types for wire encoding and decoding.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding wire records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Payload could not be parsed into the expected record.
    #[error("decode failed: {0}")]
    Decode(String),

    /// Record could not be serialized.
    #[error("encode failed: {0}")]
    Encode(String),

    /// Channel envelope carried an event name this client does not know.
    #[error("unknown channel event: {0}")]
    UnknownEvent(String),
}

impl ProtocolError {
    pub(crate) fn decode(err: &serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }

    pub(crate) fn encode(err: &serde_json::Error) -> Self {
        Self::Encode(err.to_string())
    }
}
