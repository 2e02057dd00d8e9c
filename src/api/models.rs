use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const UNKNOWN_USER: &str = "Unknown User";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Profile fields as they appear when expanded inside a conversation.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct ParticipantProfile {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Participant {
    #[serde(default)]
    pub profiles: Option<ParticipantProfile>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Label {
    pub id: String,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct LabelLink {
    #[serde(default)]
    pub labels: Option<Label>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub chat_labels: Vec<LabelLink>,
    #[serde(default)]
    pub chat_participants: Vec<Participant>,
}

impl Conversation {
    /// The explicit name, or the participants' names joined with ", ".
    pub fn display_name(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        self.chat_participants
            .iter()
            .map(|p| {
                p.profiles
                    .as_ref()
                    .and_then(|pr| pr.display_name.as_deref())
                    .filter(|n| !n.is_empty())
                    .unwrap_or(UNKNOWN_USER)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn labels(&self) -> impl Iterator<Item = &Label> {
        self.chat_labels.iter().filter_map(|l| l.labels.as_ref())
    }

    pub fn has_label(&self, name: &str) -> bool {
        self.labels().any(|l| l.name == name)
    }

    pub fn participant(&self, user_id: &str) -> Option<&ParticipantProfile> {
        self.chat_participants
            .iter()
            .filter_map(|p| p.profiles.as_ref())
            .find(|p| p.id == user_id)
    }
}

/// Row shape of the initial `chat_participants` query: one membership with its chat expanded.
#[derive(Debug, Deserialize)]
pub struct Membership {
    pub chat_id: String,
    pub chats: Option<Conversation>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Sender {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<Sender>,
}

#[derive(Debug, Serialize, Clone)]
pub struct NewMessage {
    pub content: String,
    pub chat_id: String,
    pub sender_id: String,
    pub is_read: bool,
}

#[derive(Debug, Serialize, Clone)]
pub struct NewProfile {
    pub id: String,
    pub display_name: String,
    pub phone_number: String,
}

/// Metadata attached to the auth user at sign-up.
#[derive(Debug, Serialize, Clone)]
pub struct ProfileFields {
    pub display_name: String,
    pub phone_number: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds.
    pub expires_at: i64,
    pub user: SessionUser,
}

impl Session {
    pub fn expires_within(&self, now: i64, margin_secs: i64) -> bool {
        self.expires_at <= now + margin_secs
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    SignedIn(Session),
    /// The account exists but the backend wants the address confirmed before issuing a session.
    ConfirmationRequired { user_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(json: serde_json::Value) -> Conversation {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn display_name_prefers_explicit_name() {
        let c = chat(serde_json::json!({
            "id": "c1",
            "name": "Team",
            "created_at": "2024-03-01T10:00:00+00:00",
            "chat_participants": [{ "profiles": { "id": "u1", "display_name": "Ana" } }]
        }));
        assert_eq!(c.display_name(), "Team");
    }

    #[test]
    fn display_name_falls_back_to_participants() {
        let c = chat(serde_json::json!({
            "id": "c1",
            "name": null,
            "is_group": true,
            "created_at": "2024-03-01T10:00:00+00:00",
            "chat_participants": [
                { "profiles": { "id": "u1", "display_name": "Ana" } },
                { "profiles": { "id": "u2", "display_name": null } },
                { "profiles": null }
            ]
        }));
        assert_eq!(c.display_name(), "Ana, Unknown User, Unknown User");
    }

    #[test]
    fn message_row_without_sender_expansion_decodes() {
        let m: Message = serde_json::from_value(serde_json::json!({
            "id": "m1",
            "chat_id": "c1",
            "sender_id": "u1",
            "content": "hi",
            "created_at": "2024-03-01T10:00:00.123456+00:00",
            "is_read": false
        }))
        .unwrap();
        assert!(m.sender.is_none());
        assert_eq!(m.created_at.timestamp(), 1_709_287_200);
    }
}
