//! Import a Telegram Desktop export into the history database.
//!
//! Usage: cargo run --bin import_history <export.json> <history.db> [chat_id]
//!
//! The export.json is from Telegram Desktop: Settings → Advanced → Export Telegram Data
//! Select JSON format and include the chat you want to import.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use std::path::Path;

use wordcloud_bot::chat::{ChatMessage, Database};

/// Telegram export format
#[derive(Deserialize)]
struct TelegramExport {
    name: String,
    #[serde(rename = "type")]
    chat_type: String,
    id: i64,
    messages: Vec<TelegramMessage>,
}

#[derive(Deserialize)]
struct TelegramMessage {
    id: i64,
    #[serde(rename = "type")]
    msg_type: String,
    date: String,
    /// Seconds since the epoch, as a string. Newer exports only.
    #[serde(default)]
    date_unixtime: Option<String>,
    from: Option<String>,
    from_id: Option<String>,
    #[serde(default)]
    text: TextContent,
}

/// Text can be a string or array of text entities
#[derive(Deserialize, Default)]
#[serde(untagged)]
enum TextContent {
    #[default]
    Empty,
    Simple(String),
    Complex(Vec<TextEntity>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextEntity {
    Plain(String),
    Formatted { text: String },
}

impl std::fmt::Display for TextContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextContent::Empty => Ok(()),
            TextContent::Simple(s) => write!(f, "{}", s),
            TextContent::Complex(entities) => {
                for e in entities {
                    match e {
                        TextEntity::Plain(s) => write!(f, "{}", s)?,
                        TextEntity::Formatted { text } => write!(f, "{}", text)?,
                    }
                }
                Ok(())
            }
        }
    }
}

fn parse_user_id(from_id: &str) -> i64 {
    // Format: "user123456789" or "channel123456789"
    from_id
        .trim_start_matches("user")
        .trim_start_matches("channel")
        .parse()
        .unwrap_or(0)
}

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// UTC timestamp in the format the bot records for live messages.
///
/// `date` is in the exporting machine's local time, so `date_unixtime` wins
/// when present; otherwise `date` is read as this machine's local time.
fn parse_timestamp(date: &str, date_unixtime: Option<&str>) -> String {
    let from_epoch = date_unixtime
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0));
    if let Some(utc) = from_epoch {
        return utc.format(TIMESTAMP_FORMAT).to_string();
    }

    NaiveDateTime::parse_from_str(date, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|local| local.with_timezone(&Utc).format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| date.replacen('T', " ", 1))
}

/// Bot API chat id for an export id: supergroups get the -100 prefix.
fn bot_chat_id(export_id: i64) -> i64 {
    if export_id > 1_000_000_000 {
        -1_000_000_000_000 - export_id
    } else if export_id > 0 {
        -export_id
    } else {
        export_id
    }
}

fn convert(export: &TelegramExport, chat_id: i64) -> (Vec<ChatMessage>, usize) {
    let mut imported = Vec::new();
    let mut skipped = 0;

    for msg in &export.messages {
        let text = msg.text.to_string();
        // Service messages, media without caption
        if msg.msg_type != "message" || text.is_empty() {
            skipped += 1;
            continue;
        }

        imported.push(ChatMessage {
            message_id: msg.id,
            chat_id,
            user_id: msg.from_id.as_deref().map(parse_user_id).unwrap_or(0),
            username: msg.from.clone().unwrap_or_else(|| "unknown".to_string()),
            timestamp: parse_timestamp(&msg.date, msg.date_unixtime.as_deref()),
            text,
        });
    }

    (imported, skipped)
}

fn run(export_path: &Path, db_path: &Path, override_chat_id: Option<i64>) -> Result<(), String> {
    println!("Reading Telegram export from {:?}...", export_path);
    let export_json = std::fs::read_to_string(export_path)
        .map_err(|e| format!("Failed to read export file: {e}"))?;
    let export: TelegramExport = serde_json::from_str(&export_json)
        .map_err(|e| format!("Failed to parse Telegram export JSON: {e}"))?;

    println!("Chat: {} (id: {})", export.name, export.id);
    println!("Chat type: {}", export.chat_type);
    println!("Total messages in export: {}", export.messages.len());

    if export.chat_type == "personal_chat" {
        return Err("This looks like a DM/personal chat, not a group. Please export only group chats.".into());
    }

    let chat_id = match override_chat_id {
        Some(id) => {
            println!("Using provided chat_id: {}", id);
            id
        }
        None => {
            let id = bot_chat_id(export.id);
            println!("Calculated chat_id: {}", id);
            id
        }
    };

    let (imported, skipped) = convert(&export, chat_id);
    println!("Converted {} messages ({} skipped)", imported.len(), skipped);

    let db = Database::open(db_path).map_err(|e| format!("Failed to open database: {e}"))?;
    let before = db.message_count(chat_id);
    for msg in &imported {
        db.add_message(msg)
            .map_err(|e| format!("Failed to insert message {}: {e}", msg.message_id))?;
    }
    let after = db.message_count(chat_id);

    println!("New messages added: {}", after - before);
    println!("Total messages for chat {}: {}", chat_id, after);
    Ok(())
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 || args.len() > 4 {
        eprintln!("Usage: {} <telegram_export.json> <history.db> [chat_id]", args[0]);
        eprintln!();
        eprintln!("Import a Telegram Desktop export into the word cloud history.");
        eprintln!("Only imports group messages (not DMs).");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  telegram_export.json  Path to Telegram export (result.json)");
        eprintln!("  history.db            Path to the bot's history database (<data_dir>/history.db)");
        eprintln!("  chat_id               Optional: specific chat_id to use (e.g., -1001234567890)");
        std::process::exit(1);
    }

    let override_chat_id = match args.get(3).map(|s| s.parse::<i64>()) {
        None => None,
        Some(Ok(id)) => Some(id),
        Some(Err(_)) => {
            eprintln!("ERROR: invalid chat_id '{}'", args[3]);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(Path::new(&args[1]), Path::new(&args[2]), override_chat_id) {
        eprintln!("ERROR: {e}");
        std::process::exit(1);
    }
}
