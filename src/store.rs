//! In-memory application state: the signed-in profile, the ordered conversation list
//! and one message ledger per conversation. Every mutation is synchronous and total.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::api::models::{Conversation, Message, Profile};

/// Where a ledger entry came from. Later variants win when the same id is seen twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Source {
    Cached,
    Fetched,
    Live,
}

#[derive(Debug, Clone)]
struct Entry {
    message: Message,
    source: Source,
}

fn thread_order(a: &Message, b: &Message) -> Ordering {
    a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
}

/// Messages of one conversation keyed by id, kept in creation order.
#[derive(Debug, Clone, Default)]
pub struct MessageLedger {
    entries: Vec<Entry>,
}

impl MessageLedger {
    /// Inserts or replaces by id. A lower-precedence copy never replaces a higher one.
    /// Returns whether the ledger changed.
    pub fn upsert(&mut self, message: Message, source: Source) -> bool {
        if let Some(pos) = self.entries.iter().position(|e| e.message.id == message.id) {
            let entry = &mut self.entries[pos];
            if source < entry.source {
                return false;
            }
            let mut message = message;
            if message.sender.is_none() {
                message.sender = entry.message.sender.take();
            }
            let reordered = message.created_at != entry.message.created_at;
            *entry = Entry { message, source };
            if reordered {
                self.entries.sort_by(|a, b| thread_order(&a.message, &b.message));
            }
            return true;
        }
        let at = self
            .entries
            .partition_point(|e| thread_order(&e.message, &message) == Ordering::Less);
        self.entries.insert(at, Entry { message, source });
        true
    }

    /// Applies an authoritative fetch: stale cached rows the server no longer returns are
    /// dropped, live rows are kept, fetched rows are upserted.
    pub fn apply_fetched(&mut self, fetched: Vec<Message>) {
        let ids: HashSet<&str> = fetched.iter().map(|m| m.id.as_str()).collect();
        self.entries
            .retain(|e| e.source != Source::Cached || ids.contains(e.message.id.as_str()));
        for message in fetched {
            self.upsert(message, Source::Fetched);
        }
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().map(|e| &e.message)
    }

    pub fn to_vec(&self) -> Vec<Message> {
        self.messages().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Partial update of a conversation's mutable fields.
#[derive(Debug, Clone, Default)]
pub struct ConversationPatch {
    pub name: Option<Option<String>>,
    pub last_message: Option<Option<String>>,
    pub last_message_at: Option<Option<DateTime<Utc>>>,
}

fn recency(c: &Conversation) -> DateTime<Utc> {
    c.last_message_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Most recent first; conversations without a last message go to the end.
pub fn sort_conversations(chats: &mut [Conversation]) {
    chats.sort_by(|a, b| recency(b).cmp(&recency(a)));
}

#[derive(Debug, Default)]
pub struct ClientStore {
    profile: Option<Profile>,
    chats: Vec<Conversation>,
    ledgers: HashMap<String, MessageLedger>,
}

impl ClientStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn set_profile(&mut self, profile: Profile) {
        self.profile = Some(profile);
    }

    pub fn chats(&self) -> &[Conversation] {
        &self.chats
    }

    pub fn chat(&self, id: &str) -> Option<&Conversation> {
        self.chats.iter().find(|c| c.id == id)
    }

    pub fn set_chats(&mut self, chats: Vec<Conversation>) {
        self.chats = chats;
        sort_conversations(&mut self.chats);
    }

    /// Adds a conversation, replacing any with the same id.
    pub fn add_chat(&mut self, chat: Conversation) {
        self.chats.retain(|c| c.id != chat.id);
        self.chats.insert(0, chat);
        sort_conversations(&mut self.chats);
    }

    pub fn update_chat(&mut self, chat_id: &str, patch: ConversationPatch) -> bool {
        let Some(chat) = self.chats.iter_mut().find(|c| c.id == chat_id) else {
            return false;
        };
        let touches_order = patch.last_message_at.is_some() || patch.last_message.is_some();
        if let Some(name) = patch.name {
            chat.name = name;
        }
        if let Some(text) = patch.last_message {
            chat.last_message = text;
        }
        if let Some(at) = patch.last_message_at {
            chat.last_message_at = at;
        }
        if touches_order {
            sort_conversations(&mut self.chats);
        }
        true
    }

    pub fn ledger(&self, chat_id: &str) -> Option<&MessageLedger> {
        self.ledgers.get(chat_id)
    }

    pub fn messages(&self, chat_id: &str) -> Vec<&Message> {
        self.ledgers
            .get(chat_id)
            .map(|l| l.messages().collect())
            .unwrap_or_default()
    }

    pub fn merge_messages(&mut self, chat_id: &str, messages: Vec<Message>, source: Source) {
        let ledger = self.ledgers.entry(chat_id.to_string()).or_default();
        match source {
            Source::Fetched => ledger.apply_fetched(messages),
            _ => {
                for m in messages {
                    ledger.upsert(m, source);
                }
            }
        }
    }

    /// Records a pushed message and moves its conversation's preview forward.
    /// An event older than the current preview leaves the preview alone.
    pub fn add_message(&mut self, message: Message) {
        if let Some(chat) = self.chats.iter_mut().find(|c| c.id == message.chat_id) {
            let newer = chat.last_message_at.is_none_or(|at| message.created_at >= at);
            if newer {
                chat.last_message = Some(message.content.clone());
                chat.last_message_at = Some(message.created_at);
                sort_conversations(&mut self.chats);
            }
        } else {
            log::debug!("message {} for unknown conversation {}", message.id, message.chat_id);
        }
        self.ledgers
            .entry(message.chat_id.clone())
            .or_default()
            .upsert(message, Source::Live);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn chat(id: &str, last: Option<i64>) -> Conversation {
        Conversation {
            id: id.into(),
            name: Some(format!("chat {id}")),
            is_group: false,
            last_message: last.map(|_| "x".to_string()),
            last_message_at: last.map(at),
            created_at: at(0),
            chat_labels: vec![],
            chat_participants: vec![],
        }
    }

    fn msg(id: &str, chat_id: &str, secs: i64) -> Message {
        Message {
            id: id.into(),
            chat_id: chat_id.into(),
            sender_id: "u1".into(),
            content: format!("body {id}"),
            created_at: at(secs),
            is_read: false,
            sender: None,
        }
    }

    fn ids(store: &ClientStore) -> Vec<&str> {
        store.chats().iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn null_timestamps_sort_last() {
        let mut store = ClientStore::new();
        store.set_chats(vec![chat("1", None), chat("2", Some(200)), chat("3", Some(100))]);
        assert_eq!(ids(&store), vec!["2", "3", "1"]);
    }

    #[test]
    fn live_message_moves_chat_to_top() {
        let mut store = ClientStore::new();
        store.set_chats(vec![chat("1", Some(300)), chat("2", Some(200))]);
        store.add_message(msg("m1", "2", 400));
        assert_eq!(ids(&store), vec!["2", "1"]);
        let two = store.chat("2").unwrap();
        assert_eq!(two.last_message.as_deref(), Some("body m1"));
        assert_eq!(two.last_message_at, Some(at(400)));
        assert_eq!(store.messages("2").len(), 1);
    }

    #[test]
    fn older_live_message_keeps_preview() {
        let mut store = ClientStore::new();
        store.set_chats(vec![chat("1", Some(300))]);
        store.add_message(msg("old", "1", 100));
        assert_eq!(store.chat("1").unwrap().last_message.as_deref(), Some("x"));
        assert_eq!(store.messages("1").len(), 1);
    }

    #[test]
    fn update_chat_resorts_on_timestamp_change() {
        let mut store = ClientStore::new();
        store.set_chats(vec![chat("1", Some(300)), chat("2", None)]);
        assert!(store.update_chat(
            "2",
            ConversationPatch {
                last_message: Some(Some("hey".into())),
                last_message_at: Some(Some(at(500))),
                ..Default::default()
            }
        ));
        assert_eq!(ids(&store), vec!["2", "1"]);
        assert!(!store.update_chat("missing", ConversationPatch::default()));
    }

    #[test]
    fn add_chat_replaces_same_id() {
        let mut store = ClientStore::new();
        store.set_chats(vec![chat("1", Some(300))]);
        store.add_chat(chat("1", Some(100)));
        store.add_chat(chat("2", Some(200)));
        assert_eq!(ids(&store), vec!["2", "1"]);
    }

    #[test]
    fn ledger_precedence() {
        let mut ledger = MessageLedger::default();
        let mut live = msg("a", "c", 10);
        live.content = "live".into();
        assert!(ledger.upsert(live, Source::Live));
        assert!(!ledger.upsert(msg("a", "c", 10), Source::Cached));
        assert!(!ledger.upsert(msg("a", "c", 10), Source::Fetched));
        assert_eq!(ledger.to_vec()[0].content, "live");
    }

    #[test]
    fn live_copy_keeps_expanded_sender() {
        let mut ledger = MessageLedger::default();
        let mut fetched = msg("a", "c", 10);
        fetched.sender = Some(crate::api::models::Sender {
            id: "u1".into(),
            display_name: Some("Ana".into()),
            avatar_url: None,
        });
        ledger.upsert(fetched, Source::Fetched);
        ledger.upsert(msg("a", "c", 10), Source::Live);
        assert_eq!(
            ledger.to_vec()[0].sender.as_ref().and_then(|s| s.display_name.clone()),
            Some("Ana".to_string())
        );
    }

    #[test]
    fn fetch_drops_stale_cache_but_keeps_live() {
        let mut ledger = MessageLedger::default();
        ledger.upsert(msg("gone", "c", 5), Source::Cached);
        ledger.upsert(msg("a", "c", 10), Source::Cached);
        ledger.upsert(msg("pushed", "c", 30), Source::Live);
        ledger.apply_fetched(vec![msg("a", "c", 10), msg("b", "c", 20)]);
        let ids: Vec<String> = ledger.messages().map(|m| m.id.clone()).collect();
        assert_eq!(ids, vec!["a", "b", "pushed"]);
    }

    #[test]
    fn ledger_orders_by_creation_then_id() {
        let mut ledger = MessageLedger::default();
        ledger.upsert(msg("b", "c", 10), Source::Fetched);
        ledger.upsert(msg("z", "c", 5), Source::Fetched);
        ledger.upsert(msg("a", "c", 10), Source::Live);
        let ids: Vec<String> = ledger.messages().map(|m| m.id.clone()).collect();
        assert_eq!(ids, vec!["z", "a", "b"]);
    }
}
