use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::api::models::{Conversation, Message};
use crate::error::CacheError;

/// The conversation list is per account; one user's list never seeds another's sidebar.
pub fn chat_list_key(user_id: &str) -> String {
    format!("chat_list_{}", user_id)
}

pub fn messages_key(chat_id: &str) -> String {
    format!("chat_messages_{}", chat_id)
}

fn db_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("com", "example", "PeriskonGTK")?;
    Some(proj.data_dir().join("cache.sqlite"))
}

/// Durable key/value mirror of server records, used to paint before the network answers.
/// Nothing in here is authoritative; entries are overwritten whenever fresher rows arrive.
pub struct RecordCache {
    conn: Connection,
}

impl RecordCache {
    pub fn open_default() -> Result<Self, CacheError> {
        let path = db_path().ok_or(CacheError::NoDataDir)?;
        Self::open(&path)
    }

    pub fn open(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, CacheError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, CacheError> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            CREATE TABLE IF NOT EXISTS records (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(Self { conn })
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT value FROM records WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        match raw {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        let text = serde_json::to_string(value)?;
        self.conn.execute(
            r#"
            INSERT INTO records (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value=excluded.value,
                updated_at=excluded.updated_at
            "#,
            params![key, text, now],
        )?;
        Ok(())
    }

    pub fn get_messages(&self, chat_id: &str) -> Result<Option<Vec<Message>>, CacheError> {
        self.get(&messages_key(chat_id))
    }

    pub fn put_messages(&self, chat_id: &str, messages: &[Message]) -> Result<(), CacheError> {
        self.put(&messages_key(chat_id), messages)
    }

    /// Upserts one pushed row into its conversation's entry, keeping creation order.
    pub fn merge_message(&self, message: &Message) -> Result<(), CacheError> {
        let mut list = self.get_messages(&message.chat_id)?.unwrap_or_default();
        match list.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => {
                let sender = existing.sender.take();
                *existing = message.clone();
                if existing.sender.is_none() {
                    existing.sender = sender;
                }
            }
            None => list.push(message.clone()),
        }
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        self.put_messages(&message.chat_id, &list)
    }

    pub fn get_chats(&self, user_id: &str) -> Result<Option<Vec<Conversation>>, CacheError> {
        self.get(&chat_list_key(user_id))
    }

    pub fn put_chats(&self, user_id: &str, chats: &[Conversation]) -> Result<(), CacheError> {
        self.put(&chat_list_key(user_id), chats)
    }
}
