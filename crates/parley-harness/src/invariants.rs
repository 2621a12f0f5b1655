//! Invariant checking for deterministic simulation testing.
//!
//! Invariants are properties that must hold after every event, whatever the
//! event sequence. Tests extract a [`ControllerSnapshot`] and run a
//! [`InvariantRegistry`] over it.

use std::{collections::HashSet, ops::Add, time::Duration};

use parley_client::{Peer, Presence, Selection, SyncController};
use parley_core::Message;
use parley_proto::PeerId;

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// Observable controller state.
#[derive(Debug, Clone)]
pub struct ControllerSnapshot {
    /// Local user id.
    pub self_id: PeerId,
    /// Active peer, if any.
    pub active_peer: Option<PeerId>,
    /// Visible conversation with the active peer.
    pub active_view: Vec<Message>,
    /// Online then offline peers.
    pub peers: Vec<Peer>,
}

impl ControllerSnapshot {
    /// Capture the observable state of `controller`.
    pub fn capture<I>(controller: &SyncController<I>) -> Self
    where
        I: Copy + Ord + Add<Duration, Output = I>,
    {
        let active_peer = match controller.selection() {
            Selection::PeerSelected { peer, .. } => Some(peer.clone()),
            Selection::NoPeerSelected => None,
        };

        Self {
            self_id: controller.profile().user_id.clone(),
            active_peer,
            active_view: controller.active_view().to_vec(),
            peers: controller.peers(),
        }
    }
}

/// An invariant that can be checked against controller state.
pub trait Invariant: Send + Sync {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the invariant against the current state.
    fn check(&self, state: &ControllerSnapshot) -> InvariantResult;
}

/// No two visible entries share an id.
pub struct UniqueMessageIds;

impl Invariant for UniqueMessageIds {
    fn name(&self) -> &'static str {
        "unique_message_ids"
    }

    fn check(&self, state: &ControllerSnapshot) -> InvariantResult {
        let mut seen = HashSet::new();
        for message in &state.active_view {
            if !seen.insert(&message.id) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("id {} appears twice", message.id),
                });
            }
        }
        Ok(())
    }
}

/// The local user never appears in its own peer list.
pub struct SelfNotListed;

impl Invariant for SelfNotListed {
    fn name(&self) -> &'static str {
        "self_not_listed"
    }

    fn check(&self, state: &ControllerSnapshot) -> InvariantResult {
        if state.peers.iter().any(|p| p.id == state.self_id) {
            return Err(Violation {
                invariant: self.name(),
                message: format!("{} listed as a peer", state.self_id),
            });
        }
        Ok(())
    }
}

/// A peer is never both online and offline.
pub struct PresencePartition;

impl Invariant for PresencePartition {
    fn name(&self) -> &'static str {
        "presence_partition"
    }

    fn check(&self, state: &ControllerSnapshot) -> InvariantResult {
        let online: HashSet<_> =
            state.peers.iter().filter(|p| p.presence == Presence::Online).map(|p| &p.id).collect();

        match state.peers.iter().find(|p| p.presence == Presence::Offline && online.contains(&p.id)) {
            Some(peer) => Err(Violation {
                invariant: self.name(),
                message: format!("{} is both online and offline", peer.id),
            }),
            None => Ok(()),
        }
    }
}

/// Every visible entry belongs to the active conversation.
pub struct ViewMatchesSelection;

impl Invariant for ViewMatchesSelection {
    fn name(&self) -> &'static str {
        "view_matches_selection"
    }

    fn check(&self, state: &ControllerSnapshot) -> InvariantResult {
        let Some(peer) = &state.active_peer else {
            return if state.active_view.is_empty() {
                Ok(())
            } else {
                Err(Violation {
                    invariant: self.name(),
                    message: "messages visible with no conversation open".to_string(),
                })
            };
        };

        match state.active_view.iter().find(|m| m.sender != *peer && m.recipient != *peer) {
            Some(stray) => Err(Violation {
                invariant: self.name(),
                message: format!("message {} does not involve {peer}", stray.id),
            }),
            None => Ok(()),
        }
    }
}

/// Registry of invariants to check.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Registry with every invariant in this module.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(UniqueMessageIds);
        registry.add(SelfNotListed);
        registry.add(PresencePartition);
        registry.add(ViewMatchesSelection);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants, returning every violation found.
    pub fn check_all(&self, state: &ControllerSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
