//! Server-side frame and record builders.

use parley_proto::{HistoryMessage, MessageId, PeerId};
use serde_json::json;

/// Presence push listing `(user_id, username)` pairs.
pub fn roster(entries: &[(&str, &str)]) -> String {
    let online: Vec<_> =
        entries.iter().map(|(id, name)| json!({ "userId": id, "username": name })).collect();
    json!({ "online": online }).to_string()
}

/// Chat push with a server-assigned id.
pub fn chat(id: &str, sender: &str, recipient: &str, text: &str) -> String {
    json!({ "_id": id, "text": text, "sender": sender, "recipient": recipient }).to_string()
}

/// Stored message as returned by the history endpoint.
pub fn stored(id: &str, sender: &str, recipient: &str, text: &str) -> HistoryMessage {
    HistoryMessage {
        id: MessageId::new(id),
        sender: PeerId::new(sender),
        recipient: PeerId::new(recipient),
        text: Some(text.to_string()),
        file: None,
    }
}
