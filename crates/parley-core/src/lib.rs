//! Parley core
//!
//! Pure state machines behind the chat synchronization engine. Nothing in this
//! crate performs I/O: time is passed in as a parameter and side effects are
//! returned as actions for a driver to execute.
//!
//! # Components
//!
//! - [`connection::ConnectionManager`]: socket lifecycle and reconnect schedule
//! - [`presence::PresenceStore`]: online roster and contact partitioning
//! - [`ledger::MessageLedger`]: per-peer deduplicated conversation sequences
//! - [`env::Environment`]: time source abstraction for deterministic tests

#![forbid(unsafe_code)]

pub mod connection;
pub mod env;
pub mod error;
pub mod ledger;
pub mod message;
pub mod presence;

pub use connection::{
    ConnectionAction, ConnectionConfig, ConnectionManager, ConnectionState, ReconnectPolicy,
};
pub use env::Environment;
pub use error::ConnectionError;
pub use ledger::{AppendOutcome, MessageLedger};
pub use message::{Message, Origin, ProvisionalIds};
pub use parley_proto::{MessageId, PeerId};
pub use presence::{Peer, Presence, PresenceStore};
