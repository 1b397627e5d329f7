//! Chat-line parsing.
//!
//! Lines starting with `/` are direct commands that bypass intent resolution;
//! anything else is natural language for the intent engine.

use crate::intent::{ScrollDirection, ScrollParams};

/// Help text for the chat commands.
pub const CHAT_HELP: &str = "Available commands:
/click [element] - Click on a UI element
/type [text] - Type the specified text
/key [keyname] - Press a specific key
/find [element] - Find a UI element
/scroll [amount] [up/down] - Scroll the page
/screenshot - Take a screenshot
/listen - Turn voice input on or off
/exit or /quit - Exit the application";

/// A direct chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Help,
    Click(String),
    Type(String),
    Key(String),
    Find(String),
    Scroll(ScrollParams),
    Screenshot,
    Listen,
    Exit,
    /// Unrecognised `/name`, with its arguments.
    Unknown { name: String, args: String },
}

/// One line of chat input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Empty,
    Text(String),
    Command(ChatCommand),
}

impl ChatInput {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Self::Text(line.to_owned());
        };

        let (name, args) = match rest.split_once(char::is_whitespace) {
            Some((name, args)) => (name.to_lowercase(), args.trim().to_owned()),
            None => (rest.to_lowercase(), String::new()),
        };
        let command = match name.as_str() {
            "help" => ChatCommand::Help,
            "click" => ChatCommand::Click(args),
            "type" => ChatCommand::Type(args),
            "key" => ChatCommand::Key(args),
            "find" => ChatCommand::Find(args),
            "scroll" => ChatCommand::Scroll(parse_scroll_args(&args)),
            "screenshot" => ChatCommand::Screenshot,
            "listen" => ChatCommand::Listen,
            "exit" | "quit" => ChatCommand::Exit,
            _ => ChatCommand::Unknown { name, args },
        };
        Self::Command(command)
    }
}

/// `[amount] [up/down]`, in either order; anything missing defaults.
fn parse_scroll_args(args: &str) -> ScrollParams {
    let mut params = ScrollParams::default();
    for word in args.split_whitespace() {
        if let Ok(n) = word.parse::<u32>() {
            params = ScrollParams::new(params.direction, n);
        } else if let Some(direction) = ScrollDirection::from_word(word) {
            params = ScrollParams::new(direction, params.amount);
        }
    }
    params
}
