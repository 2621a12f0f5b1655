//! Property-based tests for frame classification.
//!
//! Inbound frames come from an untrusted socket, so decoding must be total:
//! every input yields either a frame or a `ProtocolError`, and roster decoding
//! accounts for every entry it was given.

#![allow(clippy::unwrap_used)]

use parley_proto::{InboundFrame, OutboundFrame, PeerId, ProtocolError};
use proptest::prelude::*;
use serde_json::{Value, json};

/// Roster entry that may or may not carry a usable `userId`.
fn roster_item_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        3 => ("[a-z0-9]{1,8}", "[A-Za-z ]{0,12}")
            .prop_map(|(id, name)| json!({ "userId": id, "username": name })),
        1 => "[A-Za-z]{0,8}".prop_map(|name| json!({ "username": name })),
        1 => any::<i64>().prop_map(|n| json!({ "userId": n })),
        1 => Just(json!(null)),
        1 => Just(json!("not-an-entry")),
    ]
}

proptest! {
    #[test]
    fn prop_decode_is_total(text in ".*") {
        // Either outcome is fine; reaching here means no panic.
        let _ = InboundFrame::decode(&text);
    }

    #[test]
    fn prop_roster_accounts_for_every_entry(
        items in prop::collection::vec(roster_item_strategy(), 0..20)
    ) {
        let expected_ok = items
            .iter()
            .filter(|v| v.get("userId").and_then(Value::as_str).is_some_and(|s| !s.is_empty()))
            .count();
        let total = items.len();
        let text = json!({ "online": items }).to_string();

        let frame = InboundFrame::decode(&text).unwrap();
        let InboundFrame::Presence(presence) = frame else {
            panic!("online key must classify as presence");
        };

        prop_assert_eq!(presence.entries.len(), expected_ok);
        prop_assert_eq!(presence.entries.len() + presence.dropped, total);
    }

    #[test]
    fn prop_non_array_roster_never_partially_applies(n in any::<i64>(), s in ".*") {
        for online in [json!(n), json!(s), json!({ "userId": "u1" }), json!(null)] {
            let text = json!({ "online": online }).to_string();
            let is_malformed = matches!(
                InboundFrame::decode(&text),
                Err(ProtocolError::MalformedRoster { .. })
            );
            prop_assert!(is_malformed);
        }
    }

    #[test]
    fn prop_outbound_frame_keeps_recipient_and_text(
        recipient in "[a-z0-9]{1,12}",
        text in ".{0,64}",
    ) {
        let frame = OutboundFrame { recipient: PeerId::new(recipient), text, file: None };
        let decoded = OutboundFrame::decode(&frame.encode().unwrap()).unwrap();
        prop_assert_eq!(decoded, frame);
    }
}
