//! Property-based tests for the message ledger and presence store.
//!
//! Tests verify that invariants hold under arbitrary operation sequences.

use std::collections::HashSet;

use parley_core::{AppendOutcome, Message, MessageId, MessageLedger, PeerId, PresenceStore};
use parley_proto::RosterEntry;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Optimistic(u8),
    Confirmed(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![(0u8..16).prop_map(Op::Optimistic), (0u8..16).prop_map(Op::Confirmed)]
}

fn message(id: u8) -> Message {
    Message::confirmed(MessageId::new(format!("m{id}")), "u2".into(), "u1".into(), String::new())
}

fn apply(ledger: &mut MessageLedger, peer: &PeerId, op: &Op) -> AppendOutcome {
    match op {
        Op::Optimistic(id) => ledger.append_optimistic(peer, message(*id)),
        Op::Confirmed(id) => ledger.append_confirmed(peer, message(*id)),
    }
}

fn op_id(op: &Op) -> u8 {
    match op {
        Op::Optimistic(id) | Op::Confirmed(id) => *id,
    }
}

proptest! {
    #[test]
    fn prop_distinct_ids_are_all_kept(ids in prop::collection::hash_set(any::<u8>(), 0..40)) {
        let mut ledger = MessageLedger::new();
        let peer = PeerId::new("u2");

        for (i, id) in ids.iter().enumerate() {
            if i % 2 == 0 {
                ledger.append_optimistic(&peer, message(*id));
            } else {
                ledger.append_confirmed(&peer, message(*id));
            }
        }

        prop_assert_eq!(ledger.len(&peer), ids.len());
    }

    #[test]
    fn prop_view_never_contains_duplicate_ids(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let mut ledger = MessageLedger::new();
        let peer = PeerId::new("u2");

        for op in &ops {
            apply(&mut ledger, &peer, op);
        }

        let distinct: HashSet<u8> = ops.iter().map(op_id).collect();
        let seen: HashSet<&MessageId> = ledger.view(&peer).iter().map(|m| &m.id).collect();

        prop_assert_eq!(seen.len(), ledger.len(&peer));
        prop_assert_eq!(ledger.len(&peer), distinct.len());
    }

    #[test]
    fn prop_view_preserves_first_insertion_order(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let mut ledger = MessageLedger::new();
        let peer = PeerId::new("u2");

        let mut expected = Vec::new();
        for op in &ops {
            let id = MessageId::new(format!("m{}", op_id(op)));
            if apply(&mut ledger, &peer, op) == AppendOutcome::Inserted {
                expected.push(id);
            }
        }

        let actual: Vec<MessageId> = ledger.view(&peer).iter().map(|m| m.id.clone()).collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn prop_confirmed_always_wins(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let mut ledger = MessageLedger::new();
        let peer = PeerId::new("u2");

        for op in &ops {
            apply(&mut ledger, &peer, op);
        }

        let confirmed: HashSet<String> = ops
            .iter()
            .filter_map(|op| match op {
                Op::Confirmed(id) => Some(format!("m{id}")),
                Op::Optimistic(_) => None,
            })
            .collect();

        for entry in ledger.view(&peer) {
            prop_assert_eq!(entry.is_optimistic(), !confirmed.contains(entry.id.as_str()));
        }
    }

    #[test]
    fn prop_roster_reflects_latest_snapshot_only(
        a in prop::collection::hash_set("[a-e]", 0..5),
        b in prop::collection::hash_set("[a-e]", 0..5),
    ) {
        let mut store = PresenceStore::new();
        let snapshot = |ids: &HashSet<String>| -> Vec<RosterEntry> {
            ids.iter()
                .map(|id| RosterEntry { user_id: id.as_str().into(), username: id.to_uppercase() })
                .collect()
        };

        store.apply_roster_snapshot(snapshot(&a));
        store.apply_roster_snapshot(snapshot(&b));

        for id in ["a", "b", "c", "d", "e"] {
            prop_assert_eq!(store.is_online(&id.into()), b.contains(id));
        }
    }
}
