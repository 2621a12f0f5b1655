//! Collaborator trait for the HTTP side of the chat service.
//!
//! Identity, the contact directory and stored history come from request /
//! response calls outside the socket. The runtime only needs them as async
//! functions; [`crate::transport::HttpBackend`] talks to the real service and
//! the simulation harness scripts them.

use std::future::Future;

use parley_proto::{Contact, HistoryMessage, PeerId, Profile};
use thiserror::Error;

/// Errors from collaborator calls.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Session is missing or expired.
    #[error("unauthorized")]
    Unauthorized,

    /// Service answered with an unexpected status.
    #[error("unexpected status: {status} body={body}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Response body, possibly empty
        body: String,
    },

    /// Request address could not be built.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Request never completed.
    #[error("request failed: {0}")]
    Transport(String),

    /// Response body did not have the expected shape.
    #[error("invalid response: {0}")]
    Decode(String),
}

/// Request / response collaborators used by the runtime.
///
/// Cloned into every spawned fetch, so implementations should be cheap
/// handles over shared state.
pub trait Backend: Clone + Send + Sync + 'static {
    /// Local identity: `{ userId, username }`.
    fn fetch_profile(&self) -> impl Future<Output = Result<Profile, BackendError>> + Send;

    /// Every known user, including ourselves.
    fn fetch_contacts(&self) -> impl Future<Output = Result<Vec<Contact>, BackendError>> + Send;

    /// Stored conversation with `peer`, oldest first.
    fn fetch_history(
        &self,
        peer: &PeerId,
    ) -> impl Future<Output = Result<Vec<HistoryMessage>, BackendError>> + Send;

    /// End the session.
    fn logout(&self) -> impl Future<Output = Result<(), BackendError>> + Send;
}
