//! Conversation messages and provisional ids.

use parley_proto::{ChatPush, HistoryMessage, MessageId, PeerId};

/// Prefix of locally generated message ids.
pub const PROVISIONAL_PREFIX: &str = "local-";

/// Where a message entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Inserted locally on send, before any server confirmation.
    Optimistic,
    /// Delivered by the server (live push or history fetch).
    Confirmed,
}

/// A message in a peer conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Dedup key. Server-assigned or provisional.
    pub id: MessageId,
    /// Author.
    pub sender: PeerId,
    /// Addressee.
    pub recipient: PeerId,
    /// Text body. Empty for file-only messages.
    pub text: String,
    /// Stored file name of an attachment.
    pub file: Option<String>,
    /// Optimistic or confirmed.
    pub origin: Origin,
}

impl Message {
    /// Locally originated message awaiting confirmation.
    pub fn optimistic(id: MessageId, sender: PeerId, recipient: PeerId, text: String) -> Self {
        Self { id, sender, recipient, text, file: None, origin: Origin::Optimistic }
    }

    /// Server-originated message.
    pub fn confirmed(id: MessageId, sender: PeerId, recipient: PeerId, text: String) -> Self {
        Self { id, sender, recipient, text, file: None, origin: Origin::Confirmed }
    }

    /// Build a confirmed message from a live push.
    ///
    /// Pushes without a server id get `fallback_id`, which never matches an
    /// existing entry.
    pub fn from_push(push: ChatPush, fallback_id: MessageId) -> Self {
        Self {
            id: push.id.unwrap_or(fallback_id),
            sender: push.sender,
            recipient: push.recipient,
            text: push.text.unwrap_or_default(),
            file: push.file,
            origin: Origin::Confirmed,
        }
    }

    /// True until the server confirms this entry.
    pub fn is_optimistic(&self) -> bool {
        self.origin == Origin::Optimistic
    }

    /// True if the id was generated locally.
    pub fn has_provisional_id(&self) -> bool {
        self.id.as_str().starts_with(PROVISIONAL_PREFIX)
    }
}

impl From<HistoryMessage> for Message {
    fn from(msg: HistoryMessage) -> Self {
        Self {
            id: msg.id,
            sender: msg.sender,
            recipient: msg.recipient,
            text: msg.text.unwrap_or_default(),
            file: msg.file,
            origin: Origin::Confirmed,
        }
    }
}

/// Generator for provisional message ids.
///
/// Values follow the wall clock in milliseconds but never repeat or go
/// backwards: each id is `max(now_ms, last + 1)`.
#[derive(Debug, Clone, Default)]
pub struct ProvisionalIds {
    last: u64,
}

impl ProvisionalIds {
    /// Create a generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Next provisional id for the given wall clock reading.
    pub fn next(&mut self, wall_clock_millis: u64) -> MessageId {
        let value = wall_clock_millis.max(self.last.saturating_add(1));
        self.last = value;
        MessageId::new(format!("{PROVISIONAL_PREFIX}{value}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provisional_ids_follow_wall_clock() {
        let mut ids = ProvisionalIds::new();
        assert_eq!(ids.next(1_700_000_000_000).as_str(), "local-1700000000000");
        assert_eq!(ids.next(1_700_000_000_500).as_str(), "local-1700000000500");
    }

    #[test]
    fn provisional_ids_never_repeat_within_a_millisecond() {
        let mut ids = ProvisionalIds::new();
        let a = ids.next(5);
        let b = ids.next(5);
        let c = ids.next(3); // clock stepped back
        assert_eq!((a.as_str(), b.as_str(), c.as_str()), ("local-5", "local-6", "local-7"));
    }

    #[test]
    fn push_without_id_uses_fallback() {
        let push = ChatPush {
            id: None,
            text: None,
            sender: "u2".into(),
            recipient: "u1".into(),
            file: Some("cat.png".into()),
        };

        let msg = Message::from_push(push, MessageId::new("local-9"));
        assert_eq!(msg.id.as_str(), "local-9");
        assert_eq!(msg.text, "");
        assert_eq!(msg.origin, Origin::Confirmed);
        assert!(msg.has_provisional_id());
    }
}
