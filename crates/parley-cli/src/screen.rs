//! Plain-text rendering of runtime updates.
//!
//! Keeps just enough state to print incrementally: the last roster and how
//! much of the open conversation has already been shown.

use std::collections::HashSet;

use parley_client::{
    ConnectionState, Message, MessageId, Peer, PeerId, Presence, Profile, SyncUpdate,
};

/// What the terminal currently shows.
#[derive(Debug)]
pub struct Screen {
    me: Profile,
    peers: Vec<Peer>,
    active: Option<PeerId>,
    shown: HashSet<MessageId>,
}

impl Screen {
    /// Screen for the logged-in user.
    pub fn new(me: Profile) -> Self {
        Self { me, peers: Vec::new(), active: None, shown: HashSet::new() }
    }

    /// Look a peer up by id, then by display name (case-insensitive).
    pub fn resolve(&self, query: &str) -> Option<PeerId> {
        self.peers
            .iter()
            .find(|p| p.id.as_str() == query)
            .or_else(|| self.peers.iter().find(|p| p.display_name.eq_ignore_ascii_case(query)))
            .map(|p| p.id.clone())
    }

    /// Remember which conversation is about to open.
    pub fn open(&mut self, peer: PeerId) -> String {
        let name = self.name_of(&peer);
        self.active = Some(peer);
        self.shown.clear();
        format!("--- {name} ---")
    }

    /// Peer list, online first.
    pub fn who(&self) -> Vec<String> {
        if self.peers.is_empty() {
            return vec!["* nobody else around".to_string()];
        }

        self.peers
            .iter()
            .map(|p| {
                let status = match p.presence {
                    Presence::Online => "online ",
                    Presence::Offline => "offline",
                };
                format!("  {status} {} ({})", p.display_name, p.id)
            })
            .collect()
    }

    /// Lines to print for an update.
    pub fn apply(&mut self, update: &SyncUpdate) -> Vec<String> {
        match update {
            SyncUpdate::Connection(state) => vec![format!("* {}", describe(*state))],
            SyncUpdate::Roster(peers) => {
                self.peers.clone_from(peers);
                let online = peers.iter().filter(|p| p.presence == Presence::Online).count();
                vec![format!("* {online} online")]
            },
            SyncUpdate::Conversation { peer, messages } => self.conversation(peer, messages),
            SyncUpdate::LoggedOut => {
                self.peers.clear();
                self.active = None;
                self.shown.clear();
                vec!["* logged out".to_string()]
            },
        }
    }

    fn conversation(&mut self, peer: &PeerId, messages: &[Message]) -> Vec<String> {
        if self.active.as_ref() != Some(peer) {
            return Vec::new();
        }

        let fresh: Vec<&Message> =
            messages.iter().filter(|m| !self.shown.contains(&m.id)).collect();
        let lines = fresh.iter().map(|m| self.line(m)).collect();
        self.shown.extend(fresh.into_iter().map(|m| m.id.clone()));
        lines
    }

    fn line(&self, message: &Message) -> String {
        let author = if message.sender == self.me.user_id {
            "me".to_string()
        } else {
            self.name_of(&message.sender)
        };

        match &message.file {
            Some(file) if message.text.is_empty() => format!("[{author}] <file {file}>"),
            Some(file) => format!("[{author}] {} <file {file}>", message.text),
            None => format!("[{author}] {}", message.text),
        }
    }

    fn name_of(&self, peer: &PeerId) -> String {
        self.peers
            .iter()
            .find(|p| &p.id == peer)
            .map_or_else(|| peer.to_string(), |p| p.display_name.clone())
    }
}

fn describe(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Disconnected => "disconnected, retrying",
        ConnectionState::Connecting => "connecting",
        ConnectionState::Connected => "connected",
    }
}
