//! Host side of the bot: the message log and the Telegram client.

pub mod database;
pub mod message;
pub mod telegram;

pub use database::{ChatHistory, Database};
pub use message::{ChatMessage, HistoryRecord};
pub use telegram::TelegramClient;
