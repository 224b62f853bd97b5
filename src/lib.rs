//! Telegram bot that turns a group's recent chat into a word cloud.

pub mod chat;
pub mod config;
pub mod plugin;
pub mod telegram_log;
pub mod wordcloud;
