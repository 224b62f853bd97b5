//! Mirrors log events into a Telegram chat.
//!
//! WARN and ERROR go out at once; INFO lines are batched and flushed every
//! few seconds so a busy word-cloud session doesn't flood the log chat.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

use crate::plugin::Replier;

/// Telegram rejects messages longer than 4096 chars.
const MAX_LOG_CHARS: usize = 4000;
const FLUSH_INTERVAL: Duration = Duration::from_secs(5);
const MAX_BUFFERED: usize = 50;

tokio::task_local! {
    /// Set while the forwarding task is talking to Telegram.
    static FORWARDING: ();
}

enum LogLine {
    Urgent(String),
    Info(String),
}

pub struct TelegramLogLayer {
    tx: mpsc::UnboundedSender<LogLine>,
}

impl TelegramLogLayer {
    /// Spawn the forwarding task. Must be called inside a tokio runtime.
    pub fn new(sink: Arc<dyn Replier>, chat_id: i64) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<LogLine>();

        tokio::spawn(async move {
            let mut buffer: Vec<String> = Vec::new();
            let mut interval = tokio::time::interval(FLUSH_INTERVAL);

            loop {
                tokio::select! {
                    line = rx.recv() => match line {
                        Some(LogLine::Urgent(text)) => send_log(sink.as_ref(), chat_id, &text).await,
                        Some(LogLine::Info(text)) => {
                            buffer.push(text);
                            if buffer.len() >= MAX_BUFFERED {
                                flush(sink.as_ref(), chat_id, &mut buffer).await;
                            }
                        }
                        None => {
                            flush(sink.as_ref(), chat_id, &mut buffer).await;
                            break;
                        }
                    },
                    _ = interval.tick() => flush(sink.as_ref(), chat_id, &mut buffer).await,
                }
            }
        });

        Self { tx }
    }
}

fn truncate_log(text: &str) -> String {
    if text.chars().count() > MAX_LOG_CHARS {
        let truncated: String = text.chars().take(MAX_LOG_CHARS).collect();
        format!("{}...", truncated)
    } else {
        text.to_string()
    }
}

/// Events the sink emits while sending are not mirrored; a failing send
/// would otherwise queue its own warning and send again forever.
async fn send_log(sink: &dyn Replier, chat_id: i64, text: &str) {
    let sent = FORWARDING.scope((), sink.reply_text(chat_id, &truncate_log(text))).await;
    if let Err(e) = sent {
        eprintln!("Failed to send log to Telegram: {e}");
    }
}

fn is_forwarding() -> bool {
    FORWARDING.try_with(|_| ()).is_ok()
}

async fn flush(sink: &dyn Replier, chat_id: i64, buffer: &mut Vec<String>) {
    if buffer.is_empty() {
        return;
    }
    let combined = buffer.join("\n");
    buffer.clear();
    send_log(sink, chat_id, &combined).await;
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else if self.message.is_empty() {
            self.message = format!("{} = {:?}", field.name(), value);
        } else {
            self.message.push_str(&format!(", {} = {:?}", field.name(), value));
        }
    }
}

impl<S: Subscriber> Layer<S> for TelegramLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        if level > Level::INFO {
            return;
        }
        // Replies to the log chat go through teloxide/reqwest, whose own
        // events must not be mirrored back.
        let target = event.metadata().target();
        if !target.starts_with(env!("CARGO_CRATE_NAME")) || is_forwarding() {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let line = match level {
            Level::ERROR => LogLine::Urgent(format!("❌ {}", visitor.message)),
            Level::WARN => LogLine::Urgent(format!("⚠️ {}", visitor.message)),
            _ => LogLine::Info(visitor.message),
        };

        if self.tx.send(line).is_err() {
            eprintln!("Log channel closed, message dropped");
        }
    }
}
