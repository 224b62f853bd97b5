//! Persistent SQLite log of group messages.
//!
//! The Bot API never hands out past messages, so every text message the bot
//! sees is recorded here and read back as room history.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, params};
use tracing::{info, warn};

use crate::chat::message::{ChatMessage, HistoryRecord};
use crate::plugin::{HistoryError, HistoryProvider};

/// Persistent SQLite database for recorded messages.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Create a new in-memory database.
    pub fn new() -> Self {
        let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
        let db = Self { conn: Mutex::new(conn) };
        db.init_schema().expect("Failed to initialize database schema");
        db
    }

    /// Open (or create) a database file.
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        let db = Self { conn: Mutex::new(conn) };
        db.init_schema()?;
        info!("Opened history database {:?} ({} messages)", path, db.total_messages());
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock leaves SQLite itself consistent.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn init_schema(&self) -> Result<(), rusqlite::Error> {
        self.conn().execute_batch(r#"
            CREATE TABLE IF NOT EXISTS messages (
                chat_id INTEGER NOT NULL,
                message_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                username TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                text TEXT NOT NULL,
                PRIMARY KEY (chat_id, message_id)
            );

            CREATE INDEX IF NOT EXISTS idx_messages_chat_time ON messages(chat_id, timestamp);
        "#)
    }

    /// Add a message, replacing any earlier copy with the same id.
    pub fn add_message(&self, msg: &ChatMessage) -> Result<(), rusqlite::Error> {
        self.conn().execute(
            "INSERT OR REPLACE INTO messages (chat_id, message_id, user_id, username, timestamp, text)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![msg.chat_id, msg.message_id, msg.user_id, msg.username, msg.timestamp, msg.text],
        )?;
        Ok(())
    }

    /// Replace the text of an edited message. Returns false if it was never recorded.
    pub fn update_text(&self, chat_id: i64, message_id: i64, text: &str) -> Result<bool, rusqlite::Error> {
        let changed = self.conn().execute(
            "UPDATE messages SET text = ?3 WHERE chat_id = ?1 AND message_id = ?2",
            params![chat_id, message_id, text],
        )?;
        Ok(changed > 0)
    }

    /// The newest `limit` messages of a chat, oldest first.
    pub fn recent_messages(&self, chat_id: i64, limit: usize) -> Result<Vec<ChatMessage>, rusqlite::Error> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT message_id, chat_id, user_id, username, timestamp, text
             FROM messages WHERE chat_id = ?1
             ORDER BY timestamp DESC, message_id DESC LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![chat_id, limit as i64], |row| {
            Ok(ChatMessage {
                message_id: row.get(0)?,
                chat_id: row.get(1)?,
                user_id: row.get(2)?,
                username: row.get(3)?,
                timestamp: row.get(4)?,
                text: row.get(5)?,
            })
        })?;

        let mut result = rows.collect::<Result<Vec<_>, _>>()?;
        result.reverse();
        Ok(result)
    }

    pub fn message_count(&self, chat_id: i64) -> usize {
        self.conn()
            .query_row("SELECT COUNT(*) FROM messages WHERE chat_id = ?1", [chat_id], |row| row.get::<_, i64>(0))
            .unwrap_or_else(|e| {
                warn!("Failed to count messages: {e}");
                0
            }) as usize
    }

    fn total_messages(&self) -> usize {
        self.conn()
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get::<_, i64>(0))
            .unwrap_or(0) as usize
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

/// Room history backed by the message log, capped at `limit` messages.
pub struct ChatHistory {
    db: Arc<Database>,
    limit: usize,
}

impl ChatHistory {
    pub fn new(db: Arc<Database>, limit: usize) -> Self {
        Self { db, limit }
    }
}

impl HistoryProvider for ChatHistory {
    fn history(&self, room_id: &str) -> Result<Vec<HistoryRecord>, HistoryError> {
        let chat_id: i64 = room_id
            .parse()
            .map_err(|_| HistoryError::InvalidRoom(room_id.to_string()))?;

        let messages = self
            .db
            .recent_messages(chat_id, self.limit)
            .map_err(|e| HistoryError::Storage(e.to_string()))?;

        Ok(messages.into_iter().map(HistoryRecord::from).collect())
    }
}
