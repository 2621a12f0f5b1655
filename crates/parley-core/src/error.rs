//! Error types for the sync core.
//!
//! Transport failures are recovered by the reconnect schedule and never reach
//! callers as errors. The one failure a caller must handle is
//! [`ConnectionError::NotConnected`]: there is no outbound queue, so the caller
//! decides whether to discard or retry.

use thiserror::Error;

use crate::connection::ConnectionState;

/// Errors that can occur during connection state machine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Send attempted while the socket is not open
    #[error("not connected (state: {state:?})")]
    NotConnected {
        /// State at the time of the send
        state: ConnectionState,
    },

    /// Transport callback that does not fit the current state
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when error occurred
        state: ConnectionState,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// Outbound frame could not be encoded
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Underlying transport error
    #[error("transport error: {0}")]
    Transport(String),
}

impl ConnectionError {
    /// Returns true if this error may go away once the connection recovers.
    ///
    /// Encoding failures and state violations are bugs in the caller and never
    /// transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NotConnected { .. } | Self::Transport(_))
    }
}

impl From<parley_proto::ProtocolError> for ConnectionError {
    fn from(err: parley_proto::ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}
