//! Per-peer message ledger.
//!
//! Holds one ordered sequence per peer and merges the three message sources
//! into it: history batches, optimistic local echoes, and live pushes.
//!
//! # Invariants
//!
//! - Within one peer sequence no two entries share an id.
//! - Order is insertion order, not timestamp order. A reconciled entry keeps
//!   the position of the optimistic entry it replaced.
//! - An optimistic entry and a confirmed entry only merge when their ids are
//!   equal. A server echo carrying a different id is a separate entry.

use std::collections::HashMap;

use parley_proto::{MessageId, PeerId};

use crate::message::{Message, Origin};

/// Effect of an append on a peer sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// New entry at the tail.
    Inserted,
    /// Confirmed message replaced the optimistic entry with the same id.
    Reconciled,
    /// Id already present; sequence unchanged.
    Duplicate,
}

/// One peer's sequence with an id index for O(1) dedup.
#[derive(Debug, Clone, Default)]
struct Conversation {
    entries: Vec<Message>,
    positions: HashMap<MessageId, usize>,
}

impl Conversation {
    fn append(&mut self, message: Message) -> AppendOutcome {
        match self.positions.get(&message.id) {
            Some(&pos) => {
                let existing = &mut self.entries[pos];
                if existing.is_optimistic() && message.origin == Origin::Confirmed {
                    *existing = message;
                    AppendOutcome::Reconciled
                } else {
                    AppendOutcome::Duplicate
                }
            },
            None => {
                self.positions.insert(message.id.clone(), self.entries.len());
                self.entries.push(message);
                AppendOutcome::Inserted
            },
        }
    }
}

/// Message ledger.
///
/// Exclusively owns every peer's message sequence. Nothing here is persisted.
#[derive(Debug, Clone, Default)]
pub struct MessageLedger {
    conversations: HashMap<PeerId, Conversation>,
}

impl MessageLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a provisional message at the tail of `peer`'s sequence.
    ///
    /// Never fails. Returns `Duplicate` if the id is already present, which
    /// only happens when a caller reuses an id.
    pub fn append_optimistic(&mut self, peer: &PeerId, mut message: Message) -> AppendOutcome {
        message.origin = Origin::Optimistic;
        self.conversation_mut(peer).append(message)
    }

    /// Insert a server-originated message.
    ///
    /// Reconciles in place if an optimistic entry with the same id exists;
    /// ignores the message if a confirmed entry with that id exists.
    pub fn append_confirmed(&mut self, peer: &PeerId, mut message: Message) -> AppendOutcome {
        message.origin = Origin::Confirmed;
        self.conversation_mut(peer).append(message)
    }

    /// Replace `peer`'s sequence with a history batch.
    ///
    /// The batch is deduplicated by id, first occurrence wins. Returns the
    /// number of entries kept.
    pub fn replace_all<M>(&mut self, peer: &PeerId, messages: M) -> usize
    where
        M: IntoIterator<Item = Message>,
    {
        let mut conversation = Conversation::default();
        for mut message in messages {
            message.origin = Origin::Confirmed;
            conversation.append(message);
        }

        let kept = conversation.entries.len();
        self.conversations.insert(peer.clone(), conversation);
        kept
    }

    /// Deduplicated, insertion-ordered sequence for display.
    pub fn view(&self, peer: &PeerId) -> &[Message] {
        self.conversations.get(peer).map(|c| c.entries.as_slice()).unwrap_or(&[])
    }

    /// Number of entries for `peer`.
    pub fn len(&self, peer: &PeerId) -> usize {
        self.view(peer).len()
    }

    /// True if `peer` has no entries.
    pub fn is_empty(&self, peer: &PeerId) -> bool {
        self.view(peer).is_empty()
    }

    /// True if `peer`'s sequence holds `id`.
    pub fn contains(&self, peer: &PeerId, id: &MessageId) -> bool {
        self.conversations.get(peer).is_some_and(|c| c.positions.contains_key(id))
    }

    /// Discard `peer`'s sequence. Returns true if anything was dropped.
    pub fn clear(&mut self, peer: &PeerId) -> bool {
        self.conversations.remove(peer).is_some()
    }

    /// Discard every sequence.
    pub fn clear_all(&mut self) {
        self.conversations.clear();
    }

    fn conversation_mut(&mut self, peer: &PeerId) -> &mut Conversation {
        self.conversations.entry(peer.clone()).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> PeerId {
        PeerId::new("u2")
    }

    fn msg(id: &str, text: &str) -> Message {
        Message::confirmed(MessageId::new(id), "u2".into(), "u1".into(), text.to_string())
    }

    fn texts(ledger: &MessageLedger) -> Vec<&str> {
        ledger.view(&peer()).iter().map(|m| m.text.as_str()).collect()
    }

    #[test]
    fn view_of_unknown_peer_is_empty() {
        let ledger = MessageLedger::new();
        assert!(ledger.view(&peer()).is_empty());
        assert!(ledger.is_empty(&peer()));
    }

    #[test]
    fn appends_keep_insertion_order() {
        let mut ledger = MessageLedger::new();
        ledger.append_confirmed(&peer(), msg("3", "c"));
        ledger.append_optimistic(&peer(), msg("local-1", "a"));
        ledger.append_confirmed(&peer(), msg("2", "b"));

        assert_eq!(texts(&ledger), vec!["c", "a", "b"]);
    }

    #[test]
    fn repeated_confirmed_id_is_ignored() {
        let mut ledger = MessageLedger::new();
        assert_eq!(ledger.append_confirmed(&peer(), msg("1", "first")), AppendOutcome::Inserted);
        assert_eq!(ledger.append_confirmed(&peer(), msg("1", "again")), AppendOutcome::Duplicate);

        assert_eq!(texts(&ledger), vec!["first"]);
    }

    #[test]
    fn confirmed_echo_with_same_id_reconciles_in_place() {
        let mut ledger = MessageLedger::new();
        ledger.append_optimistic(&peer(), msg("local-7", "hi"));
        ledger.append_confirmed(&peer(), msg("9", "later"));

        let outcome = ledger.append_confirmed(&peer(), msg("local-7", "hi"));
        assert_eq!(outcome, AppendOutcome::Reconciled);

        let view = ledger.view(&peer());
        assert_eq!(view.len(), 2);
        assert_eq!(view[0].id.as_str(), "local-7");
        assert_eq!(view[0].origin, Origin::Confirmed);
    }

    #[test]
    fn confirmed_echo_with_new_id_shows_both() {
        let mut ledger = MessageLedger::new();
        ledger.append_optimistic(&peer(), msg("local-7", "hi"));
        ledger.append_confirmed(&peer(), msg("srv-1", "hi"));

        assert_eq!(texts(&ledger), vec!["hi", "hi"]);
    }

    #[test]
    fn optimistic_never_overrides_confirmed() {
        let mut ledger = MessageLedger::new();
        ledger.append_confirmed(&peer(), msg("1", "server"));
        assert_eq!(ledger.append_optimistic(&peer(), msg("1", "local")), AppendOutcome::Duplicate);
        assert_eq!(ledger.view(&peer())[0].origin, Origin::Confirmed);
    }

    #[test]
    fn replace_all_discards_previous_entries_and_dedups_batch() {
        let mut ledger = MessageLedger::new();
        ledger.append_optimistic(&peer(), msg("local-1", "pending"));

        let kept = ledger.replace_all(&peer(), vec![msg("1", "a"), msg("2", "b"), msg("1", "dup")]);

        assert_eq!(kept, 2);
        assert_eq!(texts(&ledger), vec!["a", "b"]);
        assert!(!ledger.contains(&peer(), &MessageId::new("local-1")));
    }

    #[test]
    fn clear_only_touches_one_peer() {
        let mut ledger = MessageLedger::new();
        let other = PeerId::new("u3");
        ledger.append_confirmed(&peer(), msg("1", "a"));
        ledger.append_confirmed(&other, msg("2", "b"));

        assert!(ledger.clear(&peer()));
        assert!(!ledger.clear(&peer()));
        assert!(ledger.view(&peer()).is_empty());
        assert_eq!(ledger.len(&other), 1);

        ledger.clear_all();
        assert!(ledger.is_empty(&other));
    }
}
