//! Parsing of the `热词` command.

use std::sync::OnceLock;

use regex::Regex;

/// Arguments as typed by the user, before defaults are applied.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandArgs {
    pub room_id: Option<String>,
    pub top_n: Option<u32>,
}

impl CommandArgs {
    /// Fill in the current room and the default top-N where the user gave none.
    pub fn resolve(self, current_room: &str, default_top: u32) -> (String, u32) {
        let room_id = self.room_id.unwrap_or_else(|| current_room.to_string());
        let top_n = self.top_n.unwrap_or(default_top);
        (room_id, top_n)
    }
}

fn command_regex() -> &'static Regex {
    static COMMAND_REGEX: OnceLock<Regex> = OnceLock::new();
    COMMAND_REGEX.get_or_init(|| {
        Regex::new(r"^热词(?:\s+id\s+(\S+))?(?:\s+top\s+([0-9]+))?$").expect("command regex")
    })
}

/// Match `热词`, `热词 top N`, `热词 id ID` and `热词 id ID top N`.
///
/// A top of 0, or one too large for `u32`, counts as not given.
pub fn parse_command(text: &str) -> Option<CommandArgs> {
    let caps = command_regex().captures(text.trim())?;

    let room_id = caps.get(1).map(|m| m.as_str().to_string());
    let top_n = caps
        .get(2)
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|&n| n > 0);

    Some(CommandArgs { room_id, top_n })
}
