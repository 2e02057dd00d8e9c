use chrono::TimeZone;

use crate::api::models::{Conversation, Message, UNKNOWN_USER};
use crate::utils::initials;
use crate::view::sidebar::time_label;

pub const SELECT_PROMPT: &str = "Select a chat to start messaging";
pub const SELECT_HINT: &str = "Choose from your existing conversations or start a new one";
pub const LOADING: &str = "Loading messages...";
pub const EMPTY: &str = "No messages yet";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Start,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bubble {
    pub id: String,
    pub own: bool,
    pub align: Align,
    /// Shown above other people's messages only.
    pub sender_label: Option<String>,
    pub content: String,
    pub time_label: String,
    pub delivered_check: bool,
}

impl Bubble {
    pub fn css_class(&self) -> &'static str {
        if self.own { "bubble-own" } else { "bubble-other" }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThreadHeader {
    pub title: String,
    pub initials: String,
    pub subtitle: String,
}

impl ThreadHeader {
    pub fn new(chat: &Conversation) -> Self {
        let title = chat.display_name();
        let lead = title.split(',').next().filter(|s| !s.is_empty()).unwrap_or("Chat");
        let subtitle = chat
            .chat_participants
            .iter()
            .filter_map(|p| p.profiles.as_ref().and_then(|pr| pr.display_name.clone()))
            .collect::<Vec<_>>()
            .join(", ");
        Self { initials: initials(lead), title, subtitle }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ThreadView {
    NoSelection,
    Loading,
    Empty,
    Messages(Vec<Bubble>),
}

fn sender_name(message: &Message, chat: Option<&Conversation>) -> String {
    message
        .sender
        .as_ref()
        .and_then(|s| s.display_name.clone())
        .or_else(|| {
            chat.and_then(|c| c.participant(&message.sender_id))
                .and_then(|p| p.display_name.clone())
        })
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| UNKNOWN_USER.to_string())
}

/// One bubble per message; no grouping of consecutive messages.
pub fn bubbles<Tz: TimeZone>(
    messages: &[&Message],
    me: Option<&str>,
    chat: Option<&Conversation>,
    tz: &Tz,
) -> Vec<Bubble>
where
    Tz::Offset: std::fmt::Display,
{
    messages
        .iter()
        .map(|m| {
            let own = me == Some(m.sender_id.as_str());
            Bubble {
                id: m.id.clone(),
                own,
                align: if own { Align::End } else { Align::Start },
                sender_label: if own { None } else { Some(sender_name(m, chat)) },
                content: m.content.clone(),
                time_label: time_label(m.created_at, tz),
                delivered_check: own,
            }
        })
        .collect()
}

pub fn thread_view<Tz: TimeZone>(
    chat: Option<&Conversation>,
    loading: bool,
    messages: &[&Message],
    me: Option<&str>,
    tz: &Tz,
) -> ThreadView
where
    Tz::Offset: std::fmt::Display,
{
    if chat.is_none() {
        return ThreadView::NoSelection;
    }
    if loading && messages.is_empty() {
        return ThreadView::Loading;
    }
    if messages.is_empty() {
        return ThreadView::Empty;
    }
    ThreadView::Messages(bubbles(messages, me, chat, tz))
}
