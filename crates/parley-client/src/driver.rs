//! Driver trait for abstracting socket I/O.
//!
//! The [`Driver`] trait decouples the runtime from a specific socket
//! implementation. Production uses a WebSocket, simulation uses scripted
//! channels, and the same [`crate::Runtime`] orchestration runs on both.

use std::future::Future;

/// Something the socket reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Text frame from the server.
    Frame(String),
    /// Socket closed, by the peer or by an error.
    Closed {
        /// Description of why the socket closed.
        reason: String,
    },
}

/// Abstracts socket operations for the runtime.
///
/// At most one socket is open at a time. The runtime only calls
/// [`recv`](Driver::recv) between a successful [`open`](Driver::open) and the
/// next [`TransportEvent::Closed`] or [`close`](Driver::close).
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Establish the socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be opened.
    fn open(&mut self, url: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Write a text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket is closed or the write fails.
    fn send_frame(&mut self, text: String) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Wait for the next socket event.
    ///
    /// Returns `None` if no socket is open.
    fn recv(&mut self) -> impl Future<Output = Option<TransportEvent>> + Send;

    /// Close the socket and release its resources. No-op if none is open.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}
