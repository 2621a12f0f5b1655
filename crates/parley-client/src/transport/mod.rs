//! Network transport for the runtime.
//!
//! Thin layers that move bytes. Protocol logic stays in the sans-IO
//! [`crate::SyncController`].
//!
//! - [`WsDriver`]: WebSocket [`crate::Driver`]
//! - [`HttpBackend`]: HTTP [`crate::Backend`]
//!
//! Both authenticate with the session cookie issued at login.

mod http;
mod ws;

pub use http::{DEFAULT_API_URL, HttpBackend};
pub use ws::{TransportError, WsDriver};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "token";

fn cookie_header(token: &str) -> String {
    format!("{SESSION_COOKIE}={token}")
}
