//! The `热词` plugin: history → renderer → cache → image host → reply.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;
use tracing::{error, info, warn};

use crate::config::WordCloudConfig;
use crate::plugin::{CommandContext, HistoryError, HistoryProvider, Plugin, Replier};
use crate::wordcloud::cache::{PersistError, persist_image};
use crate::wordcloud::client::{ApiError, WordCloudApi};
use crate::wordcloud::command::parse_command;
use crate::wordcloud::normalize::build_words;

/// The only thing users are told when any step fails.
pub const FAILURE_REPLY: &str = "获取热词失败";

const HELP: &str = "输入 {热词} => 当前聊天室热词，默认前30个\n\
                    输入 {热词 top 10} => 当前聊天室热词前10个\n\
                    输入 {热词 id xxx} => 指定聊天室热词\n\
                    输入 {热词 id xxx top 10} => 指定聊天室热词前10个";

/// A failed word-cloud invocation, by the step that failed.
#[derive(Debug)]
pub enum WordCloudError {
    HistoryFetch(HistoryError),
    Render(ApiError),
    ImagePersist(PersistError),
    Upload(ApiError),
}

impl fmt::Display for WordCloudError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HistoryFetch(e) => write!(f, "failed to fetch history: {}", e),
            Self::Render(e) => write!(f, "failed to render word cloud: {}", e),
            Self::ImagePersist(e) => write!(f, "failed to save word cloud: {}", e),
            Self::Upload(e) => write!(f, "failed to upload word cloud: {}", e),
        }
    }
}

impl std::error::Error for WordCloudError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::HistoryFetch(e) => Some(e),
            Self::Render(e) | Self::Upload(e) => Some(e),
            Self::ImagePersist(e) => Some(e),
        }
    }
}

pub struct WordCloudPlugin {
    history: Arc<dyn HistoryProvider>,
    replier: Arc<dyn Replier>,
    api: WordCloudApi,
    cache_dir: PathBuf,
    default_top: u32,
    emoji_tokens: Vec<String>,
}

impl WordCloudPlugin {
    /// Build the plugin, creating `cache_dir` if needed.
    pub fn new(
        config: &WordCloudConfig,
        cache_dir: PathBuf,
        history: Arc<dyn HistoryProvider>,
        replier: Arc<dyn Replier>,
    ) -> std::io::Result<Self> {
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self {
            history,
            replier,
            api: WordCloudApi::new(config.render_url.clone(), config.upload_url.clone()),
            cache_dir,
            default_top: config.default_top,
            emoji_tokens: config.emoji_tokens.clone(),
        })
    }

    /// Produce a hosted word cloud for `room_id` and return its URL.
    ///
    /// Steps run strictly in order and stop at the first failure, so a failed
    /// render leaves the cache untouched.
    pub async fn generate(&self, room_id: &str, top_n: u32) -> Result<String, WordCloudError> {
        let records = self.history.history(room_id).map_err(WordCloudError::HistoryFetch)?;
        let words = build_words(&records, &self.emoji_tokens);

        let image = self
            .api
            .render(&words, top_n)
            .await
            .map_err(WordCloudError::Render)?;

        let today = Local::now().date_naive();
        let path = persist_image(&self.cache_dir, room_id, today, &image)
            .await
            .map_err(WordCloudError::ImagePersist)?;

        self.api.upload(&path).await.map_err(WordCloudError::Upload)
    }
}

#[async_trait]
impl Plugin for WordCloudPlugin {
    fn name(&self) -> &'static str {
        "wordcloud"
    }

    fn help(&self) -> &'static str {
        HELP
    }

    async fn handle(&self, ctx: &CommandContext) -> bool {
        let Some(args) = parse_command(&ctx.text) else {
            return false;
        };
        let (room_id, top_n) = args.resolve(&ctx.room_id(), self.default_top);
        info!("☁️ Word cloud for room {} (top {}) requested in chat {}", room_id, top_n, ctx.chat_id);

        let sent = match self.generate(&room_id, top_n).await {
            Ok(url) => {
                info!("☁️ Word cloud for room {} hosted at {}", room_id, url);
                self.replier.reply_image(ctx.chat_id, &url).await
            }
            Err(e) => {
                error!("Word cloud for room {} failed: {}", room_id, e);
                self.replier.reply_text(ctx.chat_id, FAILURE_REPLY).await
            }
        };
        if let Err(e) = sent {
            warn!("Failed to reply to chat {}: {}", ctx.chat_id, e);
        }
        true
    }
}
