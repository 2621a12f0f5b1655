//! Controller events and actions.

use parley_proto::{Attachment, Contact, HistoryMessage, PeerId};

/// Events the caller feeds into the controller.
///
/// The caller is responsible for:
/// - Reporting transport lifecycle (opened, failed, closed) and inbound text
/// - Driving time forward via ticks
/// - Completing collaborator calls requested by [`ClientAction`]s
/// - Forwarding user intents (select a peer, send a message)
///
/// Generic over `I` (Instant type) to support both production
/// (`std::time::Instant`) and simulation (virtual instant) environments.
#[derive(Debug, Clone)]
pub enum ClientEvent<I = std::time::Instant> {
    /// Establish the connection if it is down.
    Connect {
        /// Current time from the environment.
        now: I,
    },

    /// Transport finished opening the socket.
    Opened,

    /// Transport failed to open the socket.
    OpenFailed {
        /// Current time from the environment.
        now: I,
        /// Transport's description of the failure.
        reason: String,
    },

    /// Socket closed.
    Closed {
        /// Current time from the environment.
        now: I,
        /// Transport's description of the closure.
        reason: String,
    },

    /// Time tick for the reconnect schedule.
    Tick {
        /// Current time from the environment.
        now: I,
    },

    /// Text frame read from the socket.
    FrameReceived(String),

    /// User opened the conversation with `peer`.
    SelectPeer {
        /// Peer to activate.
        peer: PeerId,
    },

    /// History fetch completed.
    HistoryLoaded {
        /// Peer the fetch was issued for.
        peer: PeerId,
        /// Epoch the fetch was issued with.
        epoch: u64,
        /// Stored messages, oldest first.
        messages: Vec<HistoryMessage>,
    },

    /// History fetch failed.
    HistoryFailed {
        /// Peer the fetch was issued for.
        peer: PeerId,
        /// Epoch the fetch was issued with.
        epoch: u64,
        /// Collaborator's description of the failure.
        reason: String,
    },

    /// Contact directory fetch completed.
    ContactsLoaded {
        /// Session generation the fetch was issued in.
        session: u64,
        /// Every known user, including ourselves.
        contacts: Vec<Contact>,
    },

    /// User wants to send a message to the active peer.
    SendIntent {
        /// Message text.
        text: String,
        /// Optional encoded attachment.
        attachment: Option<Attachment>,
        /// Wall clock reading used to stamp the provisional id.
        wall_clock_millis: u64,
    },

    /// Session ended at the collaborator. Drop the connection and all state.
    LoggedOut,
}

/// Actions the controller produces for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Open a socket to this address.
    OpenConnection {
        /// Server address.
        url: String,
    },

    /// Write an encoded text frame to the socket.
    SendFrame(String),

    /// Close the socket.
    CloseConnection {
        /// Why the socket is being closed.
        reason: String,
    },

    /// Fetch stored messages for `peer` and report back with
    /// [`ClientEvent::HistoryLoaded`] or [`ClientEvent::HistoryFailed`],
    /// echoing `epoch`.
    FetchHistory {
        /// Peer whose conversation to fetch.
        peer: PeerId,
        /// Token identifying this fetch.
        epoch: u64,
    },

    /// Fetch the contact directory and report back with
    /// [`ClientEvent::ContactsLoaded`], echoing `session`.
    FetchContacts {
        /// Session generation at issue time.
        session: u64,
    },

    /// The visible sequence for `peer` changed.
    ConversationChanged {
        /// Peer whose conversation changed.
        peer: PeerId,
    },

    /// The online roster or the contact partition changed.
    RosterChanged,

    /// Log message for debugging.
    Log {
        /// Log message.
        message: String,
    },
}
