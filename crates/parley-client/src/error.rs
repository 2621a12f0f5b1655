//! Error types for the synchronization controller.

use parley_core::{ConnectionError, ConnectionState};
use parley_proto::ProtocolError;
use thiserror::Error;

/// Errors returned by [`crate::SyncController::handle`].
///
/// None of these are fatal. The runtime logs them and keeps processing
/// events; state is left as it was before the failing event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Send intent while the socket is not open. Nothing was sent and no
    /// optimistic entry was inserted.
    #[error("not connected (state: {state:?})")]
    NotConnected {
        /// Connection state at the time of the send
        state: ConnectionState,
    },

    /// Inbound frame could not be decoded. Prior state is retained.
    #[error("dropped inbound frame: {0}")]
    Protocol(#[from] ProtocolError),

    /// Connection state machine refused a transition.
    #[error("connection error: {0}")]
    Connection(ConnectionError),
}

impl ClientError {
    /// Returns true if retrying the same intent later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NotConnected { .. } => true,
            Self::Connection(err) => err.is_transient(),
            Self::Protocol(_) => false,
        }
    }
}

impl From<ConnectionError> for ClientError {
    fn from(err: ConnectionError) -> Self {
        match err {
            ConnectionError::NotConnected { state } => Self::NotConnected { state },
            other => Self::Connection(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_connected_is_lifted_out_of_connection_errors() {
        let err = ClientError::from(ConnectionError::NotConnected {
            state: ConnectionState::Connecting,
        });
        assert_eq!(err, ClientError::NotConnected { state: ConnectionState::Connecting });
        assert!(err.is_transient());
    }

    #[test]
    fn protocol_errors_are_permanent() {
        let err = ClientError::from(ProtocolError::NotAnObject);
        assert!(!err.is_transient());
    }
}
