//! Message types shared by the history store and the plugins.

use serde::{Deserialize, Serialize};

/// A chat message as recorded by the bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: i64,
    /// Chat ID where this message was sent (negative = group, positive = DM).
    pub chat_id: i64,
    pub user_id: i64,
    pub username: String,
    pub timestamp: String,
    pub text: String,
}

/// One entry of a room's history, as handed to plugins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRecord {
    pub content: String,
}

impl HistoryRecord {
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into() }
    }
}

impl From<ChatMessage> for HistoryRecord {
    fn from(msg: ChatMessage) -> Self {
        Self { content: msg.text }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_record_takes_text() {
        let msg = ChatMessage {
            message_id: 4521,
            chat_id: -12345,
            user_id: 923847,
            username: "Alice".to_string(),
            timestamp: "2024-01-15 10:31".to_string(),
            text: "hey everyone".to_string(),
        };

        let record = HistoryRecord::from(msg);
        assert_eq!(record.content, "hey everyone");
    }
}
