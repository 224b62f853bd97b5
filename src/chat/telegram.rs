//! Telegram client using teloxide.

use async_trait::async_trait;
use reqwest::Url;
use teloxide::prelude::*;
use teloxide::types::InputFile;
use tracing::{info, warn};

use crate::plugin::Replier;

/// Telegram API client.
#[derive(Clone)]
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<i64, String> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .map(|msg| msg.id.0 as i64)
            .map_err(|e| {
                let msg = format!("Failed to send: {e}");
                warn!("{}", msg);
                msg
            })
    }

    /// Send a photo that Telegram downloads from `url`.
    pub async fn send_image_url(&self, chat_id: i64, url: &str) -> Result<i64, String> {
        info!("📷 Sending image {} to chat {}", url, chat_id);

        let url = Url::parse(url).map_err(|e| {
            let msg = format!("Invalid image url '{url}': {e}");
            warn!("{}", msg);
            msg
        })?;

        self.bot
            .send_photo(ChatId(chat_id), InputFile::url(url))
            .await
            .map(|msg| msg.id.0 as i64)
            .map_err(|e| {
                let msg = format!("Failed to send image: {e}");
                warn!("{}", msg);
                msg
            })
    }
}

#[async_trait]
impl Replier for TelegramClient {
    async fn reply_text(&self, chat_id: i64, text: &str) -> Result<(), String> {
        self.send_message(chat_id, text).await.map(|_| ())
    }

    async fn reply_image(&self, chat_id: i64, url: &str) -> Result<(), String> {
        self.send_image_url(chat_id, url).await.map(|_| ())
    }
}
