//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while decoding or encoding wire frames.
///
/// None of these are fatal: the caller drops the offending frame and keeps
/// its prior state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame text is not valid JSON.
    #[error("invalid json: {0}")]
    InvalidJson(String),

    /// Frame is valid JSON but not an object.
    #[error("frame is not a json object")]
    NotAnObject,

    /// Object carries neither an `online` nor a `text` field.
    #[error("unrecognized frame shape (keys: {keys:?})")]
    UnrecognizedFrame {
        /// Top-level keys present on the frame
        keys: Vec<String>,
    },

    /// Presence push whose `online` field is not a sequence.
    #[error("malformed roster: `online` must be an array, got {found}")]
    MalformedRoster {
        /// JSON type that was found instead
        found: &'static str,
    },

    /// Chat push missing a required field or carrying a wrong type.
    #[error("malformed chat message: {0}")]
    MalformedMessage(String),

    /// Serialization of an outbound frame failed.
    #[error("encode failed: {0}")]
    Encode(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidJson(err.to_string())
    }
}
