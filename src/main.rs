use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::ChatKind;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use wordcloud_bot::chat::{ChatHistory, ChatMessage, Database, TelegramClient};
use wordcloud_bot::config::Config;
use wordcloud_bot::plugin::{CommandContext, PluginRegistry};
use wordcloud_bot::telegram_log::TelegramLogLayer;
use wordcloud_bot::wordcloud::WordCloudPlugin;
use wordcloud_bot::wordcloud::command::parse_command;

struct BotState {
    config: Config,
    db: Arc<Database>,
    telegram: Arc<TelegramClient>,
    plugins: PluginRegistry,
}

impl BotState {
    fn new(config: Config, db: Arc<Database>, telegram: Arc<TelegramClient>) -> std::io::Result<Self> {
        let history = Arc::new(ChatHistory::new(db.clone(), config.wordcloud.history_limit));
        let wordcloud = WordCloudPlugin::new(&config.wordcloud, config.cache_dir(), history, telegram.clone())?;

        let mut plugins = PluginRegistry::new();
        plugins.register(Arc::new(wordcloud));
        info!("Registered {} plugin(s)", plugins.len());

        Ok(Self { config, db, telegram, plugins })
    }
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "wordcloud.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let bot = Bot::new(&config.telegram_bot_token);
    let telegram = Arc::new(TelegramClient::new(bot.clone()));

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("wordcloud.log"))
        .expect("Failed to open log file");
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    let registry = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        );

    if let Some(log_chat_id) = config.log_chat_id {
        let tg_layer = TelegramLogLayer::new(telegram.clone(), log_chat_id.0);
        registry.with(tg_layer).init();
    } else {
        registry.init();
    }

    info!("🚀 Starting wordcloud bot...");
    info!("Loaded config from {}", config.config_path.display());
    if config.allowed_groups.is_empty() {
        info!("Serving all groups");
    } else {
        info!("Allowed groups: {:?}", config.allowed_groups);
    }

    let db = match Database::open(&config.history_db_path()) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            eprintln!("Failed to open history database: {e}");
            std::process::exit(1);
        }
    };

    let state = match BotState::new(config, db, telegram) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            eprintln!("Failed to create word cloud cache directory: {e}");
            std::process::exit(1);
        }
    };

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_new_message))
        .branch(Update::filter_edited_message().endpoint(handle_edited_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn handle_new_message(msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let is_group = matches!(msg.chat.kind, ChatKind::Public(_));
    let is_private = matches!(msg.chat.kind, ChatKind::Private(_));

    let text = match msg.text() {
        Some(t) => t,
        None => return Ok(()),
    };

    if is_private {
        if text.trim() == "/help" || text.trim() == "/start" {
            state.telegram.send_message(msg.chat.id.0, &state.plugins.help_text()).await.ok();
        }
        return Ok(());
    }

    if !is_group || !state.config.is_allowed_group(msg.chat.id) {
        return Ok(());
    }

    if should_record(text) {
        if let Err(e) = state.db.add_message(&telegram_to_chat_message(&msg, text)) {
            warn!("Failed to record message {} in chat {}: {e}", msg.id.0, msg.chat.id.0);
        }
    }

    if text.trim() == "/help" {
        state.telegram.send_message(msg.chat.id.0, &state.plugins.help_text()).await.ok();
        return Ok(());
    }

    let ctx = CommandContext {
        chat_id: msg.chat.id.0,
        message_id: msg.id.0 as i64,
        text: text.to_string(),
    };
    state.plugins.dispatch(&ctx).await;

    Ok(())
}

/// Bot commands stay out of the history so they don't show up in clouds.
fn should_record(text: &str) -> bool {
    text.trim() != "/help" && parse_command(text).is_none()
}

fn telegram_to_chat_message(msg: &Message, text: &str) -> ChatMessage {
    let user = msg.from.as_ref();
    let user_id = user.map(|u| u.id.0 as i64).unwrap_or(0);
    let username = user
        .and_then(|u| u.username.as_deref())
        .unwrap_or_else(|| user.map(|u| u.first_name.as_str()).unwrap_or("unknown"))
        .to_string();

    ChatMessage {
        message_id: msg.id.0 as i64,
        chat_id: msg.chat.id.0,
        user_id,
        username,
        timestamp: msg.date.format("%Y-%m-%d %H:%M:%S").to_string(),
        text: text.to_string(),
    }
}

async fn handle_edited_message(msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    if !matches!(msg.chat.kind, ChatKind::Public(_)) || !state.config.is_allowed_group(msg.chat.id) {
        return Ok(());
    }

    let Some(text) = msg.text() else {
        return Ok(());
    };

    match state.db.update_text(msg.chat.id.0, msg.id.0 as i64, text) {
        Ok(true) => {}
        Ok(false) => {
            if let Err(e) = state.db.add_message(&telegram_to_chat_message(&msg, text)) {
                warn!("Failed to record edited message {}: {e}", msg.id.0);
            }
        }
        Err(e) => warn!("Failed to update edited message {}: {e}", msg.id.0),
    }

    Ok(())
}
