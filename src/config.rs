use reqwest::Url;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use teloxide::types::ChatId;

pub const DEFAULT_RENDER_URL: &str = "https://bot.yqqy.top/api/wordcloud";
pub const DEFAULT_UPLOAD_URL: &str = "https://bot.yqqy.top/api/uploadImg";
pub const DEFAULT_TOP: u32 = 30;
pub const DEFAULT_HISTORY_LIMIT: usize = 5000;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// An endpoint is not a valid URL.
    InvalidUrl { url: String, reason: String },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::InvalidUrl { url, reason } => {
                write!(f, "invalid url '{}': {}", url, reason)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::InvalidUrl { .. } | Self::Validation(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    telegram_bot_token: String,
    /// Groups the bot records and serves. Empty means every group.
    #[serde(default)]
    allowed_groups: Vec<i64>,
    log_chat_id: Option<i64>,
    /// Directory for state files (history, logs, cache). Defaults to current directory.
    data_dir: Option<String>,
    #[serde(default)]
    wordcloud: WordCloudFile,
}

#[derive(Deserialize, Default)]
struct WordCloudFile {
    render_url: Option<String>,
    upload_url: Option<String>,
    default_top: Option<u32>,
    history_limit: Option<usize>,
    /// Replaces the built-in emoji list when set.
    emoji_tokens: Option<Vec<String>>,
}

/// Settings of the word-cloud plugin.
#[derive(Debug, Clone)]
pub struct WordCloudConfig {
    pub render_url: Url,
    pub upload_url: Url,
    pub default_top: u32,
    /// Messages of history fed into one cloud.
    pub history_limit: usize,
    pub emoji_tokens: Vec<String>,
}

impl Default for WordCloudConfig {
    fn default() -> Self {
        Self {
            render_url: Url::parse(DEFAULT_RENDER_URL).expect("default render url"),
            upload_url: Url::parse(DEFAULT_UPLOAD_URL).expect("default upload url"),
            default_top: DEFAULT_TOP,
            history_limit: DEFAULT_HISTORY_LIMIT,
            emoji_tokens: default_emoji_tokens(),
        }
    }
}

pub struct Config {
    /// Path to the config file.
    pub config_path: PathBuf,
    pub telegram_bot_token: String,
    pub allowed_groups: HashSet<ChatId>,
    pub log_chat_id: Option<ChatId>,
    /// Directory for state files (history, logs, cache).
    pub data_dir: PathBuf,
    pub wordcloud: WordCloudConfig,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;

        if file.telegram_bot_token.is_empty() {
            return Err(ConfigError::Validation("telegram_bot_token is required".into()));
        }
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = file.telegram_bot_token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::Validation(
                "telegram_bot_token appears invalid (expected format: 123456789:ABCdefGHI...)".into()
            ));
        }

        let wordcloud = WordCloudConfig::from_file(file.wordcloud)?;

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            config_path,
            telegram_bot_token: file.telegram_bot_token,
            allowed_groups: file.allowed_groups.into_iter().map(ChatId).collect(),
            log_chat_id: file.log_chat_id.map(ChatId),
            data_dir,
            wordcloud,
        })
    }

    pub fn is_allowed_group(&self, chat_id: ChatId) -> bool {
        self.allowed_groups.is_empty() || self.allowed_groups.contains(&chat_id)
    }

    pub fn history_db_path(&self) -> PathBuf {
        self.data_dir.join("history.db")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("wordcloud").join("cache")
    }
}

impl WordCloudConfig {
    fn from_file(file: WordCloudFile) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let render_url = match file.render_url {
            Some(url) => parse_url(url)?,
            None => defaults.render_url,
        };
        let upload_url = match file.upload_url {
            Some(url) => parse_url(url)?,
            None => defaults.upload_url,
        };

        let default_top = file.default_top.unwrap_or(defaults.default_top);
        if default_top == 0 {
            return Err(ConfigError::Validation("wordcloud.default_top must be greater than 0".into()));
        }
        let history_limit = file.history_limit.unwrap_or(defaults.history_limit);
        if history_limit == 0 {
            return Err(ConfigError::Validation("wordcloud.history_limit must be greater than 0".into()));
        }

        let emoji_tokens = file
            .emoji_tokens
            .map(|tokens| tokens.into_iter().filter(|t| !t.is_empty()).collect())
            .unwrap_or(defaults.emoji_tokens);

        Ok(Self { render_url, upload_url, default_top, history_limit, emoji_tokens })
    }
}

fn parse_url(url: String) -> Result<Url, ConfigError> {
    Url::parse(&url).map_err(|e| ConfigError::InvalidUrl { reason: e.to_string(), url })
}

/// Emoji that show up as text noise in chat history: Unicode emoji plus the
/// bracketed sticker codes some clients paste as plain text.
fn default_emoji_tokens() -> Vec<String> {
    [
        "😀", "😁", "😂", "🤣", "😃", "😄", "😅", "😆", "😉", "😊", "😋", "😎", "😍", "😘", "🥰",
        "🙂", "🤗", "🤔", "😐", "😑", "😶", "🙄", "😏", "😣", "😥", "😮", "😯", "😪", "😫", "😴",
        "😌", "😛", "😜", "😝", "😒", "😓", "😔", "😕", "🙃", "😲", "🙁", "😖", "😞", "😟", "😤",
        "😢", "😭", "😦", "😧", "😨", "😩", "😬", "😰", "😱", "😳", "🤪", "😵", "😡", "😠", "🤬",
        "😷", "🤒", "🤕", "🤢", "🤮", "🥵", "🥶", "🥴", "🤯", "🥳", "🤓", "🧐", "😈", "👿", "💀",
        "🤡", "💩", "👻", "👽", "🤖", "😺", "🙈", "🙉", "🙊", "❤️", "💔", "💯", "💢", "💥", "💦",
        "👍", "👎", "👌", "✌️", "🤞", "🤝", "👏", "🙌", "🙏", "💪", "👀", "🔥", "🎉", "✨", "⭐",
        "[微笑]", "[撇嘴]", "[色]", "[发呆]", "[得意]", "[流泪]", "[害羞]", "[闭嘴]", "[睡]", "[大哭]",
        "[尴尬]", "[发怒]", "[调皮]", "[呲牙]", "[惊讶]", "[难过]", "[囧]", "[抓狂]", "[吐]", "[偷笑]",
        "[愉快]", "[白眼]", "[傲慢]", "[困]", "[惊恐]", "[憨笑]", "[悠闲]", "[咒骂]", "[疑问]", "[嘘]",
        "[晕]", "[衰]", "[骷髅]", "[敲打]", "[再见]", "[擦汗]", "[抠鼻]", "[鼓掌]", "[坏笑]", "[右哼哼]",
        "[鄙视]", "[委屈]", "[快哭了]", "[阴险]", "[亲亲]", "[可怜]", "[笑脸]", "[生病]", "[脸红]", "[破涕为笑]",
        "[恐惧]", "[失望]", "[无语]", "[嘿哈]", "[捂脸]", "[奸笑]", "[机智]", "[皱眉]", "[耶]", "[吃瓜]",
        "[加油]", "[汗]", "[天啊]", "[Emm]", "[社会社会]", "[旺柴]", "[好的]", "[打脸]", "[哇]", "[翻白眼]",
        "[666]", "[让我看看]", "[叹气]", "[苦涩]", "[裂开]", "[嘴唇]", "[爱心]", "[心碎]", "[拥抱]", "[强]",
        "[弱]", "[握手]", "[胜利]", "[抱拳]", "[勾引]", "[拳头]", "[OK]", "[合十]", "[啤酒]", "[咖啡]",
        "[蛋糕]", "[玫瑰]", "[凋谢]", "[菜刀]", "[炸弹]", "[便便]", "[月亮]", "[太阳]", "[庆祝]", "[礼物]",
        "[红包]", "[發]", "[福]", "[烟花]", "[爆竹]", "[猪头]", "[跳跳]", "[发抖]", "[转圈]",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn assert_err<T>(result: Result<T, ConfigError>) -> ConfigError {
        match result {
            Ok(_) => panic!("expected error, got Ok"),
            Err(e) => e,
        }
    }

    #[test]
    fn test_valid_config_uses_defaults() {
        let file = write_config(r#"{
            "telegram_bot_token": "123456789:ABCdefGHIjklMNOpqrsTUVwxyz"
        }"#);
        let config = Config::load(file.path()).expect("should load valid config");
        assert!(config.allowed_groups.is_empty());
        assert!(config.is_allowed_group(ChatId(-42)));
        assert_eq!(config.data_dir, PathBuf::from("."));
        assert_eq!(config.wordcloud.default_top, 30);
        assert_eq!(config.wordcloud.history_limit, DEFAULT_HISTORY_LIMIT);
        assert_eq!(config.wordcloud.render_url.as_str(), DEFAULT_RENDER_URL);
        assert_eq!(config.wordcloud.upload_url.as_str(), DEFAULT_UPLOAD_URL);
        assert!(config.wordcloud.emoji_tokens.iter().any(|t| t == "😀"));
    }

    #[test]
    fn test_wordcloud_overrides() {
        let file = write_config(r#"{
            "telegram_bot_token": "123456789:ABCdef",
            "allowed_groups": [-1001],
            "data_dir": "/var/lib/wordcloud",
            "wordcloud": {
                "render_url": "http://localhost:8080/render",
                "upload_url": "http://localhost:8080/upload",
                "default_top": 50,
                "history_limit": 200,
                "emoji_tokens": ["🐱", ""]
            }
        }"#);
        let config = Config::load(file.path()).unwrap();
        assert!(config.is_allowed_group(ChatId(-1001)));
        assert!(!config.is_allowed_group(ChatId(-1002)));
        assert_eq!(config.cache_dir(), PathBuf::from("/var/lib/wordcloud/wordcloud/cache"));
        assert_eq!(config.history_db_path(), PathBuf::from("/var/lib/wordcloud/history.db"));
        assert_eq!(config.wordcloud.render_url.as_str(), "http://localhost:8080/render");
        assert_eq!(config.wordcloud.default_top, 50);
        assert_eq!(config.wordcloud.history_limit, 200);
        assert_eq!(config.wordcloud.emoji_tokens, vec!["🐱".to_string()]);
    }

    #[test]
    fn test_empty_token() {
        let file = write_config(r#"{ "telegram_bot_token": "" }"#);
        let err = assert_err(Config::load(file.path()));
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("telegram_bot_token"));
    }

    #[test]
    fn test_invalid_token_format_no_colon() {
        let file = write_config(r#"{ "telegram_bot_token": "invalid_token_no_colon" }"#);
        let err = assert_err(Config::load(file.path()));
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("invalid"));
    }

    #[test]
    fn test_invalid_token_format_non_numeric_id() {
        let file = write_config(r#"{ "telegram_bot_token": "notanumber:ABCdef" }"#);
        let err = assert_err(Config::load(file.path()));
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_zero_default_top() {
        let file = write_config(r#"{
            "telegram_bot_token": "123456789:ABCdef",
            "wordcloud": { "default_top": 0 }
        }"#);
        let err = assert_err(Config::load(file.path()));
        assert!(err.to_string().contains("default_top"));
    }

    #[test]
    fn test_invalid_render_url() {
        let file = write_config(r#"{
            "telegram_bot_token": "123456789:ABCdef",
            "wordcloud": { "render_url": "not a url" }
        }"#);
        let err = assert_err(Config::load(file.path()));
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
        assert!(err.to_string().contains("not a url"));
    }

    #[test]
    fn test_file_not_found() {
        let err = assert_err(Config::load("/nonexistent/path/config.json"));
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_invalid_json() {
        let file = write_config("{ invalid json }");
        let err = assert_err(Config::load(file.path()));
        assert!(matches!(err, ConfigError::ParseJson { .. }));
    }
}
