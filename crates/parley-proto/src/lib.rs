//! Parley wire protocol
//!
//! JSON frames exchanged with the chat server over the live socket, plus the
//! request/response shapes of the HTTP collaborators (profile, contacts,
//! history).
//!
//! The server never tags its frames. Inbound frames are classified by shape:
//! an `online` key marks a presence push, a `text` key marks a chat push.
//! [`InboundFrame::decode`] performs that classification and is the only entry
//! point for untrusted socket input.

#![forbid(unsafe_code)]

pub mod api;
pub mod errors;
pub mod frame;
mod ids;

pub use api::{Contact, HistoryMessage, Profile};
pub use errors::{ProtocolError, Result};
pub use frame::{Attachment, ChatPush, InboundFrame, OutboundFrame, PresenceFrame, RosterEntry};
pub use ids::{MessageId, PeerId};
