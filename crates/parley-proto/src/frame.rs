//! Socket frames.
//!
//! Inbound frames are untagged JSON objects classified by shape. Outbound
//! frames have exactly one shape (a chat send) and are plain serde structs.
//!
//! # Invariants
//!
//! - A frame with an `online` key is always treated as presence, even if it
//!   also carries `text`.
//! - A presence push whose `online` field is not an array is rejected as a
//!   whole. Individual roster entries without a usable `userId` are dropped
//!   and counted, never rejected as a whole.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    MessageId, PeerId,
    errors::{ProtocolError, Result},
};

/// Frame received from the chat server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// Full snapshot of who is currently online.
    Presence(PresenceFrame),
    /// A chat message pushed by the server.
    Chat(ChatPush),
}

impl InboundFrame {
    /// Classify and decode a raw text frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidJson` if `text` is not JSON
    /// - `ProtocolError::NotAnObject` if the top-level value is not an object
    /// - `ProtocolError::MalformedRoster` if `online` is not an array
    /// - `ProtocolError::MalformedMessage` if a chat push lacks sender/recipient
    /// - `ProtocolError::UnrecognizedFrame` if neither `online` nor `text` is
    ///   present
    pub fn decode(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(mut map) = value else {
            return Err(ProtocolError::NotAnObject);
        };

        if let Some(online) = map.remove("online") {
            return decode_roster(online).map(Self::Presence);
        }

        if map.contains_key("text") {
            return decode_chat(map).map(Self::Chat);
        }

        Err(ProtocolError::UnrecognizedFrame { keys: map.keys().cloned().collect() })
    }
}

/// Decoded presence push.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceFrame {
    /// Well-formed roster entries, in the order the server sent them.
    pub entries: Vec<RosterEntry>,
    /// Number of entries dropped because they had no usable `userId`.
    pub dropped: usize,
}

/// One online user in a presence push.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RosterEntry {
    /// User identifier.
    #[serde(rename = "userId")]
    pub user_id: PeerId,
    /// Display name. Empty if the server omitted it.
    pub username: String,
}

/// Chat message pushed by the server: `{ text, sender, recipient, file?, _id? }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatPush {
    /// Server-assigned message id, if the server included one.
    #[serde(rename = "_id", alias = "id", default)]
    pub id: Option<MessageId>,
    /// Message text. `None` for file-only messages.
    #[serde(default)]
    pub text: Option<String>,
    /// Author of the message.
    pub sender: PeerId,
    /// Addressee of the message.
    pub recipient: PeerId,
    /// Stored file name of an attachment.
    #[serde(default)]
    pub file: Option<String>,
}

/// File attached to an outbound message.
///
/// `data` is produced by the external attachment encoder (a data URL in the
/// reference client) and is opaque to the sync core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Original file name.
    pub name: String,
    /// Encoded file content.
    pub data: String,
}

/// Outbound chat send: `{ recipient, text, file }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundFrame {
    /// Addressee.
    pub recipient: PeerId,
    /// Message text.
    pub text: String,
    /// Optional attachment. Serialized as `null` when absent.
    pub file: Option<Attachment>,
}

impl OutboundFrame {
    /// Serialize to the JSON text sent over the socket.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Encode` if serialization fails
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Parse an outbound frame (server side, or test inspection).
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidJson` if `text` does not match the send shape
    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

fn decode_roster(online: Value) -> Result<PresenceFrame> {
    let items = match online {
        Value::Array(items) => items,
        other => return Err(ProtocolError::MalformedRoster { found: json_type(&other) }),
    };

    let mut frame = PresenceFrame { entries: Vec::with_capacity(items.len()), dropped: 0 };
    for item in items {
        match roster_entry(&item) {
            Some(entry) => frame.entries.push(entry),
            None => frame.dropped += 1,
        }
    }

    Ok(frame)
}

fn roster_entry(item: &Value) -> Option<RosterEntry> {
    let user_id = item.get("userId")?.as_str()?;
    if user_id.is_empty() {
        return None;
    }

    let username = item.get("username").and_then(Value::as_str).unwrap_or_default();
    Some(RosterEntry { user_id: PeerId::new(user_id), username: username.to_string() })
}

fn decode_chat(map: Map<String, Value>) -> Result<ChatPush> {
    serde_json::from_value(Value::Object(map))
        .map_err(|e| ProtocolError::MalformedMessage(e.to_string()))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn presence_push_is_classified_by_online_key() {
        let frame =
            InboundFrame::decode(r#"{"online":[{"userId":"u3","username":"Bob"}]}"#).unwrap();

        assert_eq!(
            frame,
            InboundFrame::Presence(PresenceFrame {
                entries: vec![RosterEntry { user_id: "u3".into(), username: "Bob".into() }],
                dropped: 0,
            })
        );
    }

    #[test]
    fn online_key_wins_over_text_key() {
        let frame = InboundFrame::decode(r#"{"online":[],"text":"hi"}"#).unwrap();
        assert!(matches!(frame, InboundFrame::Presence(_)));
    }

    #[test]
    fn roster_entries_without_user_id_are_dropped_individually() {
        let frame = InboundFrame::decode(
            r#"{"online":[{"username":"ghost"},{"userId":"u1","username":"Ann"},{"userId":7},"junk",{"userId":""}]}"#,
        )
        .unwrap();

        let InboundFrame::Presence(presence) = frame else {
            panic!("expected presence frame");
        };
        assert_eq!(presence.entries.len(), 1);
        assert_eq!(presence.entries[0].user_id.as_str(), "u1");
        assert_eq!(presence.dropped, 4);
    }

    #[test]
    fn roster_entry_without_username_gets_empty_name() {
        let frame = InboundFrame::decode(r#"{"online":[{"userId":"u9"}]}"#).unwrap();
        let InboundFrame::Presence(presence) = frame else {
            panic!("expected presence frame");
        };
        assert_eq!(presence.entries[0].username, "");
    }

    #[test]
    fn non_array_roster_is_rejected() {
        let err = InboundFrame::decode(r#"{"online":{"userId":"u1"}}"#).unwrap_err();
        assert_eq!(err, ProtocolError::MalformedRoster { found: "object" });
    }

    #[test]
    fn chat_push_decodes_server_id() {
        let frame = InboundFrame::decode(
            r#"{"text":"hey","sender":"u2","recipient":"u1","file":null,"_id":"abc"}"#,
        )
        .unwrap();

        let InboundFrame::Chat(chat) = frame else {
            panic!("expected chat frame");
        };
        assert_eq!(chat.id, Some(MessageId::new("abc")));
        assert_eq!(chat.text.as_deref(), Some("hey"));
        assert_eq!(chat.file, None);
    }

    #[test]
    fn chat_push_with_null_text_is_file_only() {
        let frame = InboundFrame::decode(
            r#"{"text":null,"sender":"u2","recipient":"u1","file":"1700000000.png"}"#,
        )
        .unwrap();

        let InboundFrame::Chat(chat) = frame else {
            panic!("expected chat frame");
        };
        assert_eq!(chat.text, None);
        assert_eq!(chat.file.as_deref(), Some("1700000000.png"));
    }

    #[test]
    fn chat_push_without_sender_is_malformed() {
        let err = InboundFrame::decode(r#"{"text":"hi","recipient":"u1"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedMessage(_)));
    }

    #[test]
    fn unknown_shape_is_rejected() {
        let err = InboundFrame::decode(r#"{"typing":true}"#).unwrap_err();
        assert_eq!(err, ProtocolError::UnrecognizedFrame { keys: vec!["typing".into()] });
    }

    #[test]
    fn garbage_is_invalid_json() {
        assert!(matches!(InboundFrame::decode("{not json"), Err(ProtocolError::InvalidJson(_))));
        assert_eq!(InboundFrame::decode("[1,2]"), Err(ProtocolError::NotAnObject));
    }

    #[test]
    fn outbound_frame_serializes_null_file() {
        let frame = OutboundFrame { recipient: "u2".into(), text: "hi".into(), file: None };
        assert_eq!(frame.encode().unwrap(), r#"{"recipient":"u2","text":"hi","file":null}"#);
    }
}
