use chrono::{DateTime, TimeZone, Utc};

use crate::api::models::Conversation;
use crate::utils::initials;

pub const NO_MESSAGES_PREVIEW: &str = "No messages yet";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeColor {
    Orange,
    Green,
    Blue,
    Red,
    Purple,
    Gray,
}

impl BadgeColor {
    pub fn for_label(name: &str) -> Self {
        match name {
            "Demo" => BadgeColor::Orange,
            "Internal" => BadgeColor::Green,
            "Content" => BadgeColor::Blue,
            "Dont Send" => BadgeColor::Red,
            "Signup" => BadgeColor::Purple,
            _ => BadgeColor::Gray,
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            BadgeColor::Orange => "badge-orange",
            BadgeColor::Green => "badge-green",
            BadgeColor::Blue => "badge-blue",
            BadgeColor::Red => "badge-red",
            BadgeColor::Purple => "badge-purple",
            BadgeColor::Gray => "badge-gray",
        }
    }
}

/// Free-text search combined (AND) with a label selection (OR across labels).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatFilter {
    query: String,
    labels: Vec<String>,
}

impl ChatFilter {
    pub fn new(query: &str, labels: &[&str]) -> Self {
        Self {
            query: query.to_string(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, query: &str) {
        self.query = query.to_string();
    }

    pub fn selected_labels(&self) -> &[String] {
        &self.labels
    }

    pub fn is_selected(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn toggle_label(&mut self, label: &str) {
        if self.is_selected(label) {
            self.labels.retain(|l| l != label);
        } else {
            self.labels.push(label.to_string());
        }
    }

    pub fn has_labels(&self) -> bool {
        !self.labels.is_empty()
    }

    pub fn matches(&self, chat: &Conversation) -> bool {
        let needle = self.query.to_lowercase();
        let matches_text = needle.is_empty()
            || chat.display_name().to_lowercase().contains(&needle)
            || chat
                .last_message
                .as_deref()
                .unwrap_or("")
                .to_lowercase()
                .contains(&needle);
        let matches_labels = self.labels.is_empty() || self.labels.iter().any(|l| chat.has_label(l));
        matches_text && matches_labels
    }

    pub fn apply<'a>(&self, chats: &'a [Conversation]) -> Vec<&'a Conversation> {
        chats.iter().filter(|c| self.matches(c)).collect()
    }
}

/// Distinct label names across all conversations, in first-seen order.
pub fn label_names(chats: &[Conversation]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for label in chats.iter().flat_map(|c| c.labels()) {
        if !label.name.is_empty() && !out.contains(&label.name) {
            out.push(label.name.clone());
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatRow {
    pub id: String,
    pub title: String,
    pub initials: String,
    pub preview: String,
    pub time_label: String,
    pub badges: Vec<(String, BadgeColor)>,
    pub avatar_url: Option<String>,
    pub selected: bool,
}

pub fn time_label<Tz: TimeZone>(ts: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    ts.with_timezone(tz).format("%H:%M").to_string()
}

impl ChatRow {
    pub fn new<Tz: TimeZone>(chat: &Conversation, selected: Option<&str>, tz: &Tz) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        let title = chat.display_name();
        let lead = title.split(',').next().filter(|s| !s.is_empty()).unwrap_or("Chat");
        let avatar_url = if chat.is_group {
            None
        } else {
            chat.chat_participants
                .first()
                .and_then(|p| p.profiles.as_ref())
                .and_then(|p| p.avatar_url.clone())
        };
        Self {
            id: chat.id.clone(),
            initials: initials(lead),
            preview: chat
                .last_message
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| NO_MESSAGES_PREVIEW.to_string()),
            time_label: time_label(chat.last_message_at.unwrap_or(chat.created_at), tz),
            badges: chat
                .labels()
                .map(|l| (l.name.clone(), BadgeColor::for_label(&l.name)))
                .collect(),
            avatar_url,
            selected: selected == Some(chat.id.as_str()),
            title,
        }
    }
}

pub fn chat_rows<Tz: TimeZone>(
    chats: &[Conversation],
    filter: &ChatFilter,
    selected: Option<&str>,
    tz: &Tz,
) -> Vec<ChatRow>
where
    Tz::Offset: std::fmt::Display,
{
    filter
        .apply(chats)
        .into_iter()
        .map(|c| ChatRow::new(c, selected, tz))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::{Label, LabelLink, Participant, ParticipantProfile};
    use chrono::TimeZone;

    fn chat(id: &str, name: Option<&str>, preview: Option<&str>, labels: &[&str]) -> Conversation {
        Conversation {
            id: id.into(),
            name: name.map(str::to_string),
            is_group: false,
            last_message: preview.map(str::to_string),
            last_message_at: None,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 0).unwrap(),
            chat_labels: labels
                .iter()
                .map(|l| LabelLink {
                    labels: Some(Label { id: format!("l-{l}"), name: l.to_string(), color: "#f00".into() }),
                })
                .collect(),
            chat_participants: vec![Participant {
                profiles: Some(ParticipantProfile {
                    id: "u2".into(),
                    display_name: Some("Bea Ortiz".into()),
                    avatar_url: Some("https://img/bea.png".into()),
                    phone_number: None,
                }),
            }],
        }
    }

    fn sample() -> Vec<Conversation> {
        vec![
            chat("1", Some("Launch Team"), Some("See you at 5"), &["Demo", "Internal"]),
            chat("2", None, Some("Invoice attached"), &["Content"]),
            chat("3", Some("Support"), None, &[]),
        ]
    }

    fn ids(chats: Vec<&Conversation>) -> Vec<&str> {
        chats.into_iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let chats = sample();
        assert_eq!(ids(ChatFilter::default().apply(&chats)), vec!["1", "2", "3"]);
    }

    #[test]
    fn text_matches_name_or_preview_case_insensitively() {
        let chats = sample();
        assert_eq!(ids(ChatFilter::new("LAUNCH", &[]).apply(&chats)), vec!["1"]);
        assert_eq!(ids(ChatFilter::new("invoice", &[]).apply(&chats)), vec!["2"]);
        assert_eq!(ids(ChatFilter::new("bea", &[]).apply(&chats)), vec!["2"]);
    }

    #[test]
    fn labels_or_together_and_with_text() {
        let chats = sample();
        assert_eq!(ids(ChatFilter::new("", &["Content", "Demo"]).apply(&chats)), vec!["1", "2"]);
        assert_eq!(ids(ChatFilter::new("support", &["Demo"]).apply(&chats)), Vec::<&str>::new());
        assert_eq!(ids(ChatFilter::new("see", &["Internal"]).apply(&chats)), vec!["1"]);
    }

    #[test]
    fn toggle_label_adds_and_removes() {
        let mut f = ChatFilter::default();
        f.toggle_label("Demo");
        f.toggle_label("Content");
        assert_eq!(f.selected_labels(), &["Demo".to_string(), "Content".to_string()]);
        f.toggle_label("Demo");
        assert_eq!(f.selected_labels(), &["Content".to_string()]);
    }

    #[test]
    fn label_names_are_distinct_in_first_seen_order() {
        let mut chats = sample();
        chats.push(chat("4", None, None, &["Internal", "Signup"]));
        assert_eq!(label_names(&chats), vec!["Demo", "Internal", "Content", "Signup"]);
    }

    #[test]
    fn row_fields() {
        let chats = sample();
        let row = ChatRow::new(&chats[1], Some("2"), &Utc);
        assert_eq!(row.title, "Bea Ortiz");
        assert_eq!(row.initials, "BO");
        assert_eq!(row.time_label, "09:05");
        assert_eq!(row.preview, "Invoice attached");
        assert_eq!(row.badges, vec![("Content".to_string(), BadgeColor::Blue)]);
        assert_eq!(row.avatar_url.as_deref(), Some("https://img/bea.png"));
        assert!(row.selected);

        let empty = ChatRow::new(&chats[2], Some("2"), &Utc);
        assert_eq!(empty.preview, NO_MESSAGES_PREVIEW);
        assert!(!empty.selected);
    }

    #[test]
    fn unknown_labels_are_gray() {
        assert_eq!(BadgeColor::for_label("Dont Send"), BadgeColor::Red);
        assert_eq!(BadgeColor::for_label("VIP"), BadgeColor::Gray);
    }
}
