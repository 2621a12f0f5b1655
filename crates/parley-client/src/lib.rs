//! Parley client
//!
//! Synchronization controller and async runtime for the Parley chat protocol.
//! Keeps a live socket to the chat server, tracks who is online and merges
//! history, optimistic sends and live pushes into one conversation per peer.
//!
//! # Architecture
//!
//! The controller follows the same sans-IO and action-based patterns as
//! [`parley_core`]. It receives events ([`ClientEvent`]), processes them
//! through pure state machine logic, and returns actions ([`ClientAction`])
//! for the caller to execute.
//!
//! # Components
//!
//! - [`SyncController`]: Top-level state machine owning the core stores
//! - [`Runtime`]: Generic event loop over a [`Driver`] and a [`Backend`]
//! - [`ClientEvent`]: Events fed into the controller
//! - [`ClientAction`]: Actions produced by the controller
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, this crate also provides:
//! - [`transport::WsDriver`]: WebSocket driver
//! - [`transport::HttpBackend`]: REST collaborators

#![forbid(unsafe_code)]

mod backend;
mod controller;
mod driver;
mod error;
mod event;
mod runtime;
mod system_env;

#[cfg(feature = "transport")]
pub mod transport;

pub use backend::{Backend, BackendError};
pub use controller::{Selection, SyncController};
pub use driver::{Driver, TransportEvent};
pub use error::ClientError;
pub use event::{ClientAction, ClientEvent};
pub use parley_core::{
    ConnectionConfig, ConnectionState, Environment, Message, Origin, Peer, Presence,
    ReconnectPolicy,
};
pub use parley_proto::{Attachment, Contact, HistoryMessage, MessageId, PeerId, Profile};
pub use runtime::{Command, Runtime, RuntimeConfig, RuntimeError, RuntimeHandle, SyncUpdate};
pub use system_env::SystemEnv;
