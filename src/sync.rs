//! Reconciles cached, fetched and pushed messages for the active conversation.
//!
//! The engine owns the [`ClientStore`] and the [`RecordCache`]. It performs no I/O
//! against the backend itself: callers run [`fetch_thread`] / [`deliver`] on the
//! runtime and feed the results back through [`SyncEngine::apply_fetched`] and
//! [`SyncEngine::apply_live`] on the thread that owns the engine.
//!
//! Merges are idempotent upserts keyed by message id (live > fetched > cached), so the
//! order in which the three sources land does not change the resulting thread.

use chrono::Utc;

use crate::api::client::ApiClient;
use crate::api::models::{Message, NewMessage, Session};
use crate::error::ApiError;
use crate::storage::RecordCache;
use crate::store::{ClientStore, Source};

/// Token handed out on selection; fetch results carry it back so a late answer for a
/// previous selection cannot repaint the current thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub chat_id: String,
    generation: u64,
    account: u64,
}

pub struct SyncEngine {
    store: ClientStore,
    cache: RecordCache,
    user: Option<String>,
    /// Bumped whenever the signed-in user changes.
    account: u64,
    active: Option<String>,
    generation: u64,
    loading: bool,
}

impl SyncEngine {
    pub fn new(cache: RecordCache) -> Self {
        Self {
            store: ClientStore::new(),
            cache,
            user: None,
            account: 0,
            active: None,
            generation: 0,
            loading: false,
        }
    }

    pub fn store(&self) -> &ClientStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ClientStore {
        &mut self.store
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Scopes the engine to `user_id`. Switching to another user (or to none) drops the
    /// in-memory state of the previous one and orphans its outstanding selections.
    pub fn set_user(&mut self, user_id: Option<&str>) {
        if self.user.as_deref() == user_id {
            return;
        }
        log::debug!("client state now scoped to {:?}", user_id);
        self.user = user_id.map(str::to_string);
        self.account += 1;
        self.generation += 1;
        self.store = ClientStore::new();
        self.active = None;
        self.loading = false;
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// True while the active thread has neither cached nor fetched rows yet.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_current(&self, selection: &Selection) -> bool {
        selection.account == self.account
            && selection.generation == self.generation
            && self.active.as_deref() == Some(selection.chat_id.as_str())
    }

    /// Seeds the conversation list from the cache so the sidebar can paint offline.
    pub fn restore_chats(&mut self) -> bool {
        let Some(user) = self.user.as_deref() else {
            return false;
        };
        match self.cache.get_chats(user) {
            Ok(Some(chats)) if !chats.is_empty() => {
                self.store.set_chats(chats);
                true
            }
            Ok(_) => false,
            Err(e) => {
                log::warn!("chat list cache unreadable: {}", e);
                false
            }
        }
    }

    /// Installs the server's conversation list and mirrors it to the cache.
    pub fn apply_chats(&mut self, chats: Vec<crate::api::models::Conversation>) {
        self.store.set_chats(chats);
        let Some(user) = self.user.as_deref() else {
            return;
        };
        if let Err(e) = self.cache.put_chats(user, self.store.chats()) {
            log::warn!("could not cache chat list: {}", e);
        }
    }

    /// Makes `chat_id` the active conversation and paints whatever the cache holds for it.
    /// Returns the selection to attach to the remote fetch, or `None` when cleared.
    pub fn select(&mut self, chat_id: Option<&str>) -> Option<Selection> {
        self.generation += 1;
        self.active = chat_id.map(str::to_string);
        let chat_id = chat_id?;

        match self.cache.get_messages(chat_id) {
            Ok(Some(cached)) => {
                log::debug!("painting {} cached messages for {}", cached.len(), chat_id);
                self.store.merge_messages(chat_id, cached, Source::Cached);
            }
            Ok(None) => {}
            Err(e) => log::warn!("message cache unreadable for {}: {}", chat_id, e),
        }
        self.loading = self.store.ledger(chat_id).is_none_or(|l| l.is_empty());

        Some(Selection {
            chat_id: chat_id.to_string(),
            generation: self.generation,
            account: self.account,
        })
    }

    /// Merges a completed fetch into its conversation and overwrites that cache entry.
    /// Returns whether the displayed thread is affected. Fetches made for a previous
    /// user are discarded.
    pub fn apply_fetched(&mut self, selection: &Selection, messages: Vec<Message>) -> bool {
        let chat_id = selection.chat_id.as_str();
        if selection.account != self.account {
            log::debug!("discarding fetch for {} made under another account", chat_id);
            return false;
        }
        self.store.merge_messages(chat_id, messages, Source::Fetched);
        if let Some(ledger) = self.store.ledger(chat_id) {
            if let Err(e) = self.cache.put_messages(chat_id, &ledger.to_vec()) {
                log::warn!("could not cache messages for {}: {}", chat_id, e);
            }
        }
        let current = self.is_current(selection);
        if current {
            self.loading = false;
        } else {
            log::debug!("fetch for {} landed after selection changed", chat_id);
        }
        current
    }

    /// The provisional list stays on screen; nothing is retried.
    pub fn fetch_failed(&mut self, selection: &Selection, error: &ApiError) {
        log::warn!("fetching messages for {} failed: {}", selection.chat_id, error);
        if self.is_current(selection) {
            self.loading = false;
        }
    }

    /// Applies one pushed row. Returns whether it belongs to the active conversation.
    pub fn apply_live(&mut self, message: Message) -> bool {
        if let Err(e) = self.cache.merge_message(&message) {
            log::warn!("could not cache pushed message {}: {}", message.id, e);
        }
        let active = self.active.as_deref() == Some(message.chat_id.as_str());
        self.store.add_message(message);
        if active {
            self.loading = false;
        }
        active
    }

    /// Messages of the active conversation, oldest first.
    pub fn thread(&self) -> Vec<&Message> {
        match self.active.as_deref() {
            Some(id) => self.store.messages(id),
            None => Vec::new(),
        }
    }
}

/// A message ready to send. Whitespace-only input never becomes one.
#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub chat_id: String,
    pub sender_id: String,
    pub content: String,
}

impl Outgoing {
    pub fn new(chat_id: &str, sender_id: &str, content: &str) -> Option<Self> {
        if content.trim().is_empty() {
            return None;
        }
        Some(Self {
            chat_id: chat_id.to_string(),
            sender_id: sender_id.to_string(),
            content: content.to_string(),
        })
    }
}

pub async fn fetch_thread(api: &ApiClient, session: &Session, chat_id: &str) -> Result<Vec<Message>, ApiError> {
    api.messages(&session.access_token, chat_id).await
}

/// Inserts the message, then moves the conversation's preview. The message itself is not
/// added locally: it shows up when the realtime feed echoes the insert.
///
/// Only the insert decides the outcome. Once the row exists a failed preview update is
/// logged, since retrying the send would duplicate the message.
pub async fn deliver(api: &ApiClient, session: &Session, outgoing: &Outgoing) -> Result<(), ApiError> {
    let row = NewMessage {
        content: outgoing.content.clone(),
        chat_id: outgoing.chat_id.clone(),
        sender_id: outgoing.sender_id.clone(),
        is_read: false,
    };
    api.insert_message(&session.access_token, &row).await?;
    if let Err(e) = api
        .update_chat_preview(&session.access_token, &outgoing.chat_id, &outgoing.content, Utc::now())
        .await
    {
        log::warn!("message sent to {} but its preview was not updated: {}", outgoing.chat_id, e);
    }
    Ok(())
}
