//! Online roster.
//!
//! The server pushes the complete list of online users whenever it changes.
//! Each snapshot replaces the previous one outright; there are no diffs to
//! apply and nothing to merge.
//!
//! The store also keeps the last contact list fetched from the directory so
//! it can split known users into online and offline partitions.

use std::collections::HashMap;

use parley_proto::{Contact, PeerId, RosterEntry};

/// Whether a peer is currently connected to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Listed in the latest roster snapshot.
    Online,
    /// Known contact not in the latest roster snapshot.
    Offline,
}

/// A user the local user can talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    /// User id.
    pub id: PeerId,
    /// Display name.
    pub display_name: String,
    /// Online or offline.
    pub presence: Presence,
}

/// Presence store.
///
/// Exclusively owns the roster mapping. Snapshot order is kept for display,
/// membership checks are hash lookups.
#[derive(Debug, Clone, Default)]
pub struct PresenceStore {
    /// Online user id to display name.
    online: HashMap<PeerId, String>,
    /// Online user ids in snapshot order, without duplicates.
    order: Vec<PeerId>,
    /// Last contact list from the directory.
    contacts: Vec<Contact>,
}

impl PresenceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the online roster with `entries`.
    ///
    /// Total replacement: anyone not in `entries` is offline afterwards. A
    /// user listed twice keeps its first position and its last display name.
    pub fn apply_roster_snapshot<R>(&mut self, entries: R)
    where
        R: IntoIterator<Item = RosterEntry>,
    {
        self.online.clear();
        self.order.clear();

        for entry in entries {
            if self.online.insert(entry.user_id.clone(), entry.username).is_none() {
                self.order.push(entry.user_id);
            }
        }
    }

    /// Online peers other than `self_id`, in snapshot order.
    pub fn excluding_self(&self, self_id: &PeerId) -> Vec<Peer> {
        self.order
            .iter()
            .filter(|id| *id != self_id)
            .filter_map(|id| {
                self.online.get(id).map(|name| Peer {
                    id: id.clone(),
                    display_name: name.clone(),
                    presence: Presence::Online,
                })
            })
            .collect()
    }

    /// True if `peer` is in the latest roster snapshot.
    pub fn is_online(&self, peer: &PeerId) -> bool {
        self.online.contains_key(peer)
    }

    /// Number of users in the latest roster snapshot.
    pub fn online_count(&self) -> usize {
        self.order.len()
    }

    /// Store the contact list fetched from the directory.
    pub fn set_contacts(&mut self, contacts: Vec<Contact>) {
        self.contacts = contacts;
    }

    /// Known contacts that are neither `self_id` nor online.
    pub fn offline_peers(&self, self_id: &PeerId) -> Vec<Peer> {
        self.contacts
            .iter()
            .filter(|c| &c.id != self_id && !self.is_online(&c.id))
            .map(|c| Peer {
                id: c.id.clone(),
                display_name: c.username.clone(),
                presence: Presence::Offline,
            })
            .collect()
    }

    /// Online peers followed by offline peers, `self_id` excluded.
    pub fn peers(&self, self_id: &PeerId) -> Vec<Peer> {
        let mut peers = self.excluding_self(self_id);
        peers.extend(self.offline_peers(self_id));
        peers
    }

    /// Display name from the roster, falling back to the contact list.
    pub fn display_name(&self, peer: &PeerId) -> Option<&str> {
        self.online
            .get(peer)
            .map(String::as_str)
            .or_else(|| self.contacts.iter().find(|c| &c.id == peer).map(|c| c.username.as_str()))
    }

    /// Forget roster and contacts.
    pub fn clear(&mut self) {
        self.online.clear();
        self.order.clear();
        self.contacts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, name: &str) -> RosterEntry {
        RosterEntry { user_id: id.into(), username: name.into() }
    }

    fn contact(id: &str, name: &str) -> Contact {
        Contact { id: id.into(), username: name.into() }
    }

    fn ids(peers: &[Peer]) -> Vec<&str> {
        peers.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn snapshot_replaces_never_unions() {
        let mut store = PresenceStore::new();
        store.apply_roster_snapshot(vec![entry("a", "A"), entry("b", "B")]);
        store.apply_roster_snapshot(vec![entry("b", "B"), entry("c", "C")]);

        assert!(!store.is_online(&"a".into()));
        assert!(store.is_online(&"b".into()));
        assert!(store.is_online(&"c".into()));
        assert_eq!(store.online_count(), 2);
    }

    #[test]
    fn excluding_self_hides_own_id() {
        let mut store = PresenceStore::new();
        store.apply_roster_snapshot(vec![entry("u1", "Me"), entry("u3", "Bob")]);

        let peers = store.excluding_self(&"u1".into());
        assert_eq!(peers, vec![Peer {
            id: "u3".into(),
            display_name: "Bob".into(),
            presence: Presence::Online
        }]);
    }

    #[test]
    fn duplicate_entries_keep_first_position_and_last_name() {
        let mut store = PresenceStore::new();
        store.apply_roster_snapshot(vec![
            entry("a", "old"),
            entry("b", "B"),
            entry("a", "new"),
        ]);

        let peers = store.excluding_self(&"me".into());
        assert_eq!(ids(&peers), vec!["a", "b"]);
        assert_eq!(peers[0].display_name, "new");
    }

    #[test]
    fn offline_partition_is_contacts_minus_self_minus_online() {
        let mut store = PresenceStore::new();
        store.set_contacts(vec![contact("u1", "Me"), contact("u2", "Ann"), contact("u3", "Bob")]);
        store.apply_roster_snapshot(vec![entry("u1", "Me"), entry("u3", "Bob")]);

        let self_id = PeerId::new("u1");
        assert_eq!(ids(&store.offline_peers(&self_id)), vec!["u2"]);
        assert_eq!(ids(&store.peers(&self_id)), vec!["u3", "u2"]);
        assert_eq!(store.peers(&self_id)[1].presence, Presence::Offline);
    }

    #[test]
    fn display_name_falls_back_to_contacts() {
        let mut store = PresenceStore::new();
        store.set_contacts(vec![contact("u2", "Ann")]);
        store.apply_roster_snapshot(vec![entry("u3", "Bob")]);

        assert_eq!(store.display_name(&"u3".into()), Some("Bob"));
        assert_eq!(store.display_name(&"u2".into()), Some("Ann"));
        assert_eq!(store.display_name(&"u9".into()), None);
    }

    #[test]
    fn clear_forgets_everything() {
        let mut store = PresenceStore::new();
        store.set_contacts(vec![contact("u2", "Ann")]);
        store.apply_roster_snapshot(vec![entry("u3", "Bob")]);

        store.clear();
        assert_eq!(store.online_count(), 0);
        assert!(store.peers(&"u1".into()).is_empty());
    }
}
