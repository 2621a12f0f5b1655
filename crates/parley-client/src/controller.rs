//! Synchronization controller.
//!
//! The `SyncController` is the top-level state machine. It owns the
//! connection manager, presence store and message ledger, routes inbound
//! frames to them and turns user intents into wire sends and optimistic
//! ledger entries.
//!
//! # State Machine
//!
//! ```text
//!                   SelectPeer(p)
//! ┌────────────────┐ ──────────> ┌──────────────────────┐
//! │ NoPeerSelected │             │ PeerSelected(p, e)   │ ──┐ SelectPeer(q)
//! └────────────────┘ <────────── └──────────────────────┘ <─┘ (new epoch)
//!                     LoggedOut
//! ```
//!
//! # Stale Results
//!
//! History fetches are never cancelled. Each one is tagged with a fresh epoch
//! that the selection records, and a result is applied only if both its peer
//! and its epoch still match the selection. Anything else is discarded.

use std::{
    ops::Add,
    time::{Duration, Instant},
};

use parley_core::{
    AppendOutcome, ConnectionAction, ConnectionManager, ConnectionState, Message, MessageLedger,
    Peer, PresenceStore, ProvisionalIds,
};
use parley_proto::{
    Attachment, ChatPush, Contact, HistoryMessage, InboundFrame, OutboundFrame, PeerId,
    PresenceFrame, Profile,
};

use crate::{
    error::ClientError,
    event::{ClientAction, ClientEvent},
};

/// Which conversation is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// No conversation open. Sends are ignored, chat pushes are dropped.
    NoPeerSelected,
    /// Conversation with `peer` is open.
    PeerSelected {
        /// Active peer.
        peer: PeerId,
        /// Epoch of the most recent history fetch for `peer`.
        epoch: u64,
    },
}

/// Synchronization controller.
///
/// Holds no message data of its own: the selection is the only state that
/// is not owned by one of the injected stores.
#[derive(Debug)]
pub struct SyncController<I = Instant>
where
    I: Copy + Ord + Add<Duration, Output = I>,
{
    /// Local identity, fetched before the controller was built.
    profile: Profile,

    /// Socket lifecycle.
    connection: ConnectionManager<I>,

    /// Online roster and contact directory.
    presence: PresenceStore,

    /// Per-peer conversations.
    ledger: MessageLedger,

    /// Provisional ids for optimistic entries and id-less pushes.
    provisional: ProvisionalIds,

    /// Active conversation.
    selection: Selection,

    /// Last epoch handed out to a history fetch.
    epoch: u64,

    /// Bumped on logout so in-flight contact fetches become stale.
    session: u64,
}

impl<I> SyncController<I>
where
    I: Copy + Ord + Add<Duration, Output = I>,
{
    /// Create a controller from its stores and the local profile.
    pub fn new(
        profile: Profile,
        connection: ConnectionManager<I>,
        presence: PresenceStore,
        ledger: MessageLedger,
    ) -> Self {
        Self {
            profile,
            connection,
            presence,
            ledger,
            provisional: ProvisionalIds::new(),
            selection: Selection::NoPeerSelected,
            epoch: 0,
            session: 0,
        }
    }

    /// Local identity.
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Connection state machine, read-only.
    pub fn connection(&self) -> &ConnectionManager<I> {
        &self.connection
    }

    /// Presence store, read-only.
    pub fn presence(&self) -> &PresenceStore {
        &self.presence
    }

    /// Current selection.
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Active peer, if a conversation is open.
    pub fn active_peer(&self) -> Option<&PeerId> {
        match &self.selection {
            Selection::PeerSelected { peer, .. } => Some(peer),
            Selection::NoPeerSelected => None,
        }
    }

    /// Deduplicated, insertion-ordered conversation with `peer`.
    pub fn view(&self, peer: &PeerId) -> &[Message] {
        self.ledger.view(peer)
    }

    /// Conversation with the active peer. Empty if none is selected.
    pub fn active_view(&self) -> &[Message] {
        self.active_peer().map(|peer| self.ledger.view(peer)).unwrap_or(&[])
    }

    /// Online peers (excluding ourselves) followed by offline contacts.
    pub fn peers(&self) -> Vec<Peer> {
        self.presence.peers(&self.profile.user_id)
    }

    /// Online peers, excluding ourselves.
    pub fn online_peers(&self) -> Vec<Peer> {
        self.presence.excluding_self(&self.profile.user_id)
    }

    /// Current session generation.
    pub fn session(&self) -> u64 {
        self.session
    }

    /// Process an event and return actions for the caller to execute.
    ///
    /// # Errors
    ///
    /// - `ClientError::NotConnected` if a send intent arrives while the
    ///   socket is not open
    /// - `ClientError::Protocol` if an inbound frame cannot be decoded
    /// - `ClientError::Connection` if a transport callback does not fit the
    ///   connection state
    ///
    /// State is unchanged when an error is returned.
    pub fn handle(&mut self, event: ClientEvent<I>) -> Result<Vec<ClientAction>, ClientError> {
        match event {
            ClientEvent::Connect { now } => {
                let actions = self.connection.connect(now);
                self.apply_connection_actions(actions)
            },
            ClientEvent::Opened => self.handle_opened(),
            ClientEvent::OpenFailed { now, reason } => {
                self.connection.handle_open_failed(now);
                Ok(self.reconnect_log(&format!("open failed: {reason}")))
            },
            ClientEvent::Closed { now, reason } => {
                self.connection.handle_closed(now);
                Ok(self.reconnect_log(&format!("connection closed: {reason}")))
            },
            ClientEvent::Tick { now } => {
                let actions = self.connection.tick(now);
                self.apply_connection_actions(actions)
            },
            ClientEvent::FrameReceived(text) => self.handle_frame(text),
            ClientEvent::SelectPeer { peer } => Ok(self.handle_select_peer(peer)),
            ClientEvent::HistoryLoaded { peer, epoch, messages } => {
                Ok(self.handle_history_loaded(peer, epoch, messages))
            },
            ClientEvent::HistoryFailed { peer, epoch, reason } => {
                Ok(self.handle_history_failed(&peer, epoch, &reason))
            },
            ClientEvent::ContactsLoaded { session, contacts } => {
                Ok(self.handle_contacts_loaded(session, contacts))
            },
            ClientEvent::SendIntent { text, attachment, wall_clock_millis } => {
                self.handle_send_intent(text, attachment, wall_clock_millis)
            },
            ClientEvent::LoggedOut => self.handle_logged_out(),
        }
    }

    fn handle_opened(&mut self) -> Result<Vec<ClientAction>, ClientError> {
        self.connection.handle_opened()?;
        Ok(vec![ClientAction::Log {
            message: format!("connected to {}", self.connection.config().url),
        }])
    }

    fn reconnect_log(&self, what: &str) -> Vec<ClientAction> {
        let message = if self.connection.reconnect_at().is_some() {
            format!("{what}, reconnect #{} scheduled", self.connection.failures())
        } else {
            what.to_string()
        };
        vec![ClientAction::Log { message }]
    }

    fn handle_frame(&mut self, text: String) -> Result<Vec<ClientAction>, ClientError> {
        match self.connection.handle_incoming(text) {
            Some(action) => self.apply_connection_actions(vec![action]),
            None => Ok(vec![ClientAction::Log {
                message: format!("dropped frame received while {:?}", self.connection.state()),
            }]),
        }
    }

    /// Translate connection actions, routing `Deliver` into this controller.
    fn apply_connection_actions(
        &mut self,
        actions: Vec<ConnectionAction>,
    ) -> Result<Vec<ClientAction>, ClientError> {
        let mut out = Vec::with_capacity(actions.len());
        for action in actions {
            match action {
                ConnectionAction::Open { url } => out.push(ClientAction::OpenConnection { url }),
                ConnectionAction::SendFrame(text) => out.push(ClientAction::SendFrame(text)),
                ConnectionAction::Close { reason } => {
                    out.push(ClientAction::CloseConnection { reason });
                },
                ConnectionAction::Deliver(text) => out.extend(self.route_frame(&text)?),
            }
        }
        Ok(out)
    }

    fn route_frame(&mut self, text: &str) -> Result<Vec<ClientAction>, ClientError> {
        match InboundFrame::decode(text)? {
            InboundFrame::Presence(frame) => Ok(self.apply_presence(frame)),
            InboundFrame::Chat(push) => Ok(self.apply_chat(push)),
        }
    }

    fn apply_presence(&mut self, frame: PresenceFrame) -> Vec<ClientAction> {
        let mut actions = Vec::new();
        if frame.dropped > 0 {
            actions.push(ClientAction::Log {
                message: format!("dropped {} roster entries without a user id", frame.dropped),
            });
        }

        self.presence.apply_roster_snapshot(frame.entries);
        actions.push(ClientAction::RosterChanged);
        actions.push(ClientAction::FetchContacts { session: self.session });
        actions
    }

    fn apply_chat(&mut self, push: ChatPush) -> Vec<ClientAction> {
        let Some(peer) = self.active_peer().cloned() else {
            return vec![ClientAction::Log {
                message: format!("dropped message from {}: no conversation open", push.sender),
            }];
        };

        if push.sender != peer {
            return vec![ClientAction::Log {
                message: format!("dropped message from {}: {} is active", push.sender, peer),
            }];
        }

        // Pushes without a server id get a local one that can never collide.
        let id = match push.id.clone() {
            Some(id) => id,
            None => self.provisional.next(0),
        };
        let message = Message::from_push(push, id);

        match self.ledger.append_confirmed(&peer, message) {
            AppendOutcome::Inserted | AppendOutcome::Reconciled => {
                vec![ClientAction::ConversationChanged { peer }]
            },
            AppendOutcome::Duplicate => vec![ClientAction::Log {
                message: format!("ignored duplicate message for {peer}"),
            }],
        }
    }

    fn handle_select_peer(&mut self, peer: PeerId) -> Vec<ClientAction> {
        if let Selection::PeerSelected { peer: previous, .. } = &self.selection {
            if *previous != peer {
                let previous = previous.clone();
                self.ledger.clear(&previous);
            }
        }

        self.ledger.clear(&peer);
        let epoch = self.next_epoch();
        self.selection = Selection::PeerSelected { peer: peer.clone(), epoch };

        vec![ClientAction::ConversationChanged { peer: peer.clone() }, ClientAction::FetchHistory {
            peer,
            epoch,
        }]
    }

    fn handle_history_loaded(
        &mut self,
        peer: PeerId,
        epoch: u64,
        messages: Vec<HistoryMessage>,
    ) -> Vec<ClientAction> {
        if !self.is_current(&peer, epoch) {
            return vec![self.stale_log(&peer, epoch)];
        }

        self.ledger.replace_all(&peer, messages.into_iter().map(Message::from));
        vec![ClientAction::ConversationChanged { peer }]
    }

    fn handle_history_failed(&self, peer: &PeerId, epoch: u64, reason: &str) -> Vec<ClientAction> {
        if !self.is_current(peer, epoch) {
            return vec![self.stale_log(peer, epoch)];
        }

        vec![ClientAction::Log { message: format!("history fetch for {peer} failed: {reason}") }]
    }

    fn handle_contacts_loaded(&mut self, session: u64, contacts: Vec<Contact>) -> Vec<ClientAction> {
        if session != self.session {
            return vec![ClientAction::Log {
                message: format!("discarded contacts from session {session}"),
            }];
        }

        self.presence.set_contacts(contacts);
        vec![ClientAction::RosterChanged]
    }

    fn handle_send_intent(
        &mut self,
        text: String,
        attachment: Option<Attachment>,
        wall_clock_millis: u64,
    ) -> Result<Vec<ClientAction>, ClientError> {
        let Some(peer) = self.active_peer().cloned() else {
            return Ok(vec![ClientAction::Log {
                message: "send ignored: no conversation open".to_string(),
            }]);
        };

        let has_attachment = attachment.is_some();
        let frame = OutboundFrame { recipient: peer.clone(), text, file: attachment };
        let send = self.connection.send(&frame)?;
        let mut actions = self.apply_connection_actions(vec![send])?;

        if has_attachment {
            // Attachments are not echoed optimistically; the stored copy is
            // fetched back instead.
            let epoch = self.next_epoch();
            self.selection = Selection::PeerSelected { peer: peer.clone(), epoch };
            actions.push(ClientAction::FetchHistory { peer, epoch });
        } else {
            let id = self.provisional.next(wall_clock_millis);
            let message =
                Message::optimistic(id, self.profile.user_id.clone(), peer.clone(), frame.text);
            self.ledger.append_optimistic(&peer, message);
            actions.push(ClientAction::ConversationChanged { peer });
        }

        Ok(actions)
    }

    fn handle_logged_out(&mut self) -> Result<Vec<ClientAction>, ClientError> {
        let close = self.connection.shutdown("logged out");
        let mut actions = self.apply_connection_actions(close)?;

        self.presence.clear();
        self.ledger.clear_all();
        self.selection = Selection::NoPeerSelected;
        self.next_epoch();
        self.session += 1;

        actions.push(ClientAction::RosterChanged);
        actions.push(ClientAction::Log { message: "logged out, state cleared".to_string() });
        Ok(actions)
    }

    fn is_current(&self, peer: &PeerId, epoch: u64) -> bool {
        matches!(
            &self.selection,
            Selection::PeerSelected { peer: active, epoch: current }
                if active == peer && *current == epoch
        )
    }

    fn stale_log(&self, peer: &PeerId, epoch: u64) -> ClientAction {
        ClientAction::Log {
            message: format!("discarded stale history for {peer} (epoch {epoch}, now {})", self.epoch),
        }
    }

    fn next_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }
}
