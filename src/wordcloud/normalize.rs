//! Cleanup of history text before it is sent to the renderer.

use crate::chat::message::HistoryRecord;

/// Drop a leading `@mention`, keeping everything from the first whitespace on.
///
/// A message that is only a mention becomes empty.
pub fn strip_mention(content: &str) -> &str {
    if !content.starts_with('@') {
        return content;
    }
    match content.find(char::is_whitespace) {
        Some(idx) => &content[idx..],
        None => "",
    }
}

/// Remove every emoji token, then a leading mention.
pub fn normalize_content(content: &str, emoji_tokens: &[String]) -> String {
    let mut text = content.to_string();
    for emoji in emoji_tokens {
        if text.contains(emoji.as_str()) {
            text = text.replace(emoji.as_str(), "");
        }
    }
    strip_mention(&text).to_string()
}

/// Join normalized contents, each followed by a single space.
pub fn build_words(records: &[HistoryRecord], emoji_tokens: &[String]) -> String {
    let mut words = String::new();
    for record in records {
        words.push_str(&normalize_content(&record.content, emoji_tokens));
        words.push(' ');
    }
    words
}
