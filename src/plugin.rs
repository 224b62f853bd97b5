//! Plugin registry and the host capabilities plugins are built on.
//!
//! Plugins are registered explicitly at startup. Each incoming text message is
//! offered to the registered plugins in order; the first one that consumes it
//! stops the dispatch.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::chat::message::HistoryRecord;

/// The message that triggered a dispatch.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub chat_id: i64,
    pub message_id: i64,
    pub text: String,
}

impl CommandContext {
    /// Identifier of the originating chat, in the form history lookups take.
    pub fn room_id(&self) -> String {
        self.chat_id.to_string()
    }
}

/// Errors returned by a history lookup.
#[derive(Debug)]
pub enum HistoryError {
    /// The room id does not name a chat this host knows how to look up.
    InvalidRoom(String),
    /// The backing store failed.
    Storage(String),
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRoom(id) => write!(f, "invalid room id '{}'", id),
            Self::Storage(msg) => write!(f, "history storage error: {}", msg),
        }
    }
}

impl std::error::Error for HistoryError {}

/// Supplies recent messages of a room, oldest first.
pub trait HistoryProvider: Send + Sync {
    fn history(&self, room_id: &str) -> Result<Vec<HistoryRecord>, HistoryError>;
}

/// Delivers replies back to a chat.
#[async_trait]
pub trait Replier: Send + Sync {
    async fn reply_text(&self, chat_id: i64, text: &str) -> Result<(), String>;

    /// Reply with an image the chat platform fetches from `url`.
    async fn reply_image(&self, chat_id: i64, url: &str) -> Result<(), String>;
}

/// A command plugin.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;

    /// Usage lines shown by `/help`.
    fn help(&self) -> &'static str;

    /// Handle the message if it is meant for this plugin.
    ///
    /// Returns `false` without side effects when the text does not match.
    async fn handle(&self, ctx: &CommandContext) -> bool;
}

#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        debug!("Registered plugin {}", plugin.name());
        self.plugins.push(plugin);
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Offer the message to each plugin until one consumes it.
    pub async fn dispatch(&self, ctx: &CommandContext) -> bool {
        for plugin in &self.plugins {
            if plugin.handle(ctx).await {
                debug!("Message {} in chat {} handled by {}", ctx.message_id, ctx.chat_id, plugin.name());
                return true;
            }
        }
        false
    }

    pub fn help_text(&self) -> String {
        self.plugins
            .iter()
            .map(|p| format!("[{}]\n{}", p.name(), p.help()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Keyword {
        name: &'static str,
        keyword: &'static str,
        calls: AtomicUsize,
    }

    impl Keyword {
        fn new(name: &'static str, keyword: &'static str) -> Arc<Self> {
            Arc::new(Self { name, keyword, calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl Plugin for Keyword {
        fn name(&self) -> &'static str {
            self.name
        }

        fn help(&self) -> &'static str {
            "say the keyword"
        }

        async fn handle(&self, ctx: &CommandContext) -> bool {
            if ctx.text != self.keyword {
                return false;
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    fn ctx(text: &str) -> CommandContext {
        CommandContext { chat_id: -100, message_id: 1, text: text.to_string() }
    }

    #[tokio::test]
    async fn test_first_match_blocks_the_rest() {
        let first = Keyword::new("first", "ping");
        let second = Keyword::new("second", "ping");
        let mut registry = PluginRegistry::new();
        registry.register(first.clone());
        registry.register(second.clone());

        assert!(registry.dispatch(&ctx("ping")).await);
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unmatched_message_is_not_consumed() {
        let plugin = Keyword::new("ping", "ping");
        let mut registry = PluginRegistry::new();
        registry.register(plugin.clone());

        assert!(!registry.dispatch(&ctx("pong")).await);
        assert_eq!(plugin.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_help_lists_every_plugin() {
        let mut registry = PluginRegistry::new();
        assert!(registry.is_empty());
        registry.register(Keyword::new("alpha", "a"));
        registry.register(Keyword::new("beta", "b"));

        let help = registry.help_text();
        assert_eq!(registry.len(), 2);
        assert!(help.contains("[alpha]"));
        assert!(help.contains("[beta]"));
    }

    #[test]
    fn test_room_id_is_chat_id() {
        assert_eq!(ctx("x").room_id(), "-100");
    }
}
