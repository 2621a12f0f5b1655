//! Shapes returned by the HTTP collaborators.

use serde::{Deserialize, Serialize};

use crate::{MessageId, PeerId};

/// Local identity, `GET /profile`: `{ userId, username }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Our own user id.
    #[serde(rename = "userId")]
    pub user_id: PeerId,
    /// Our own display name.
    pub username: String,
}

/// Known user, `GET /people`: `{ _id, username }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// User id.
    #[serde(rename = "_id", alias = "id")]
    pub id: PeerId,
    /// Display name.
    pub username: String,
}

/// Stored message, `GET /messages/{peer}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    /// Server-assigned id.
    #[serde(rename = "_id", alias = "id")]
    pub id: MessageId,
    /// Author.
    pub sender: PeerId,
    /// Addressee.
    pub recipient: PeerId,
    /// Text. `None` for file-only messages.
    #[serde(default)]
    pub text: Option<String>,
    /// Stored file name of an attachment.
    #[serde(default)]
    pub file: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn history_message_reads_mongo_style_ids() {
        let msg: HistoryMessage = serde_json::from_str(
            r#"{"_id":"1","sender":"u2","recipient":"u1","text":"old","createdAt":"2024-01-01"}"#,
        )
        .unwrap();

        assert_eq!(msg.id.as_str(), "1");
        assert_eq!(msg.text.as_deref(), Some("old"));
        assert_eq!(msg.file, None);
    }

    #[test]
    fn profile_uses_camel_case_user_id() {
        let profile: Profile = serde_json::from_str(r#"{"userId":"u1","username":"Ann"}"#).unwrap();
        assert_eq!(profile.user_id.as_str(), "u1");
    }
}
