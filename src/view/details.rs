use crate::api::models::{Conversation, UNKNOWN_USER};
use crate::utils::initials;

pub const SELECT_PROMPT: &str = "Select a chat to view details";
pub const NO_LABELS: &str = "No labels";
pub const SHARED_FILES_TITLE: &str = "Shared Files";
pub const NO_FILES: &str = "No files shared yet";
const FALLBACK_LABEL_COLOR: &str = "#888";

#[derive(Debug, Clone, PartialEq)]
pub struct MemberRow {
    pub name: String,
    pub initials: String,
    pub phone: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelChip {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailsPanel {
    pub members: Vec<MemberRow>,
    pub labels: Vec<LabelChip>,
}

impl DetailsPanel {
    pub fn new(chat: &Conversation) -> Self {
        let members = chat
            .chat_participants
            .iter()
            .map(|p| {
                let profile = p.profiles.as_ref();
                let display = profile.and_then(|pr| pr.display_name.clone()).filter(|n| !n.is_empty());
                MemberRow {
                    initials: initials(display.as_deref().unwrap_or("User")),
                    name: display.unwrap_or_else(|| UNKNOWN_USER.to_string()),
                    phone: profile.and_then(|pr| pr.phone_number.clone()).unwrap_or_default(),
                    avatar_url: profile.and_then(|pr| pr.avatar_url.clone()),
                }
            })
            .collect();
        let labels = chat
            .labels()
            .map(|l| LabelChip {
                name: l.name.clone(),
                color: if l.color.is_empty() { FALLBACK_LABEL_COLOR.to_string() } else { l.color.clone() },
            })
            .collect();
        Self { members, labels }
    }
}

/// Affordances that open an explanatory dialog and change nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    AddMember,
    AddLabel,
}

impl Placeholder {
    pub fn title(self) -> &'static str {
        match self {
            Placeholder::AddMember => "Add Members",
            Placeholder::AddLabel => "Add Label",
        }
    }

    pub fn body(self) -> &'static str {
        match self {
            Placeholder::AddMember => "This functionality would allow adding new members to the chat.",
            Placeholder::AddLabel => "This functionality would allow adding labels to the chat.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::{Label, LabelLink, Participant, ParticipantProfile};
    use chrono::Utc;

    #[test]
    fn members_and_labels() {
        let chat = Conversation {
            id: "c".into(),
            name: Some("Ops".into()),
            is_group: true,
            last_message: None,
            last_message_at: None,
            created_at: Utc::now(),
            chat_labels: vec![
                LabelLink { labels: Some(Label { id: "1".into(), name: "Demo".into(), color: "#f80".into() }) },
                LabelLink { labels: Some(Label { id: "2".into(), name: "Bare".into(), color: String::new() }) },
                LabelLink { labels: None },
            ],
            chat_participants: vec![
                Participant {
                    profiles: Some(ParticipantProfile {
                        id: "u1".into(),
                        display_name: Some("Ana Ruiz".into()),
                        avatar_url: None,
                        phone_number: Some("5550001111".into()),
                    }),
                },
                Participant { profiles: None },
            ],
        };
        let panel = DetailsPanel::new(&chat);
        assert_eq!(panel.members[0].initials, "AR");
        assert_eq!(panel.members[0].phone, "5550001111");
        assert_eq!(panel.members[1].name, UNKNOWN_USER);
        assert_eq!(panel.members[1].initials, "U");
        assert_eq!(panel.labels.len(), 2);
        assert_eq!(panel.labels[1].color, "#888");
    }
}
