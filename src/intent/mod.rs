//! Intent resolution: turning free-form text into an `(intent, parameters)` pair.
//!
//! Three strategies implement [`IntentResolver`]:
//!
//! - [`RemoteIntentResolver`](remote::RemoteIntentResolver) asks an Ollama
//!   server to classify the utterance and can also write confirmation text.
//! - [`LocalParseResolver`](local::LocalParseResolver) runs the
//!   [`PatternMatcher`](patterns::PatternMatcher) and falls back to a
//!   rule-based grammatical parse.
//! - [`KeywordResolver`](local::KeywordResolver) runs the same patterns and
//!   falls back to plain keyword spotting.
//!
//! [`IntentEngine`](engine::IntentEngine) picks one of them at startup.

pub mod engine;
pub mod local;
pub mod parse;
pub mod patterns;
pub mod remote;
pub mod vocabulary;


use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use engine::IntentEngine;

/// Scroll amount used when none is given or the given one is unusable.
pub const DEFAULT_SCROLL_AMOUNT: u32 = 5;

// ── Intent ─────────────────────────────────────────────────────

/// What the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Click,
    Type,
    Scroll,
    Open,
    Help,
    Exit,
    /// Free conversation answered by the language model.
    Conversation,
    Unknown,
}

impl Intent {
    /// Intents that map to a desktop command, in matching precedence order.
    pub const COMMANDS: [Intent; 6] = [
        Intent::Click,
        Intent::Type,
        Intent::Scroll,
        Intent::Open,
        Intent::Help,
        Intent::Exit,
    ];

    /// Wire name of the intent.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Type => "type",
            Self::Scroll => "scroll",
            Self::Open => "open",
            Self::Help => "help",
            Self::Exit => "exit",
            Self::Conversation => "conversation",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a wire name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        [Self::Conversation, Self::Unknown]
            .into_iter()
            .chain(Self::COMMANDS)
            .find(|i| i.as_str() == name)
    }

    /// Whether the intent carries a free-text target.
    pub fn takes_target(self) -> bool {
        matches!(self, Self::Click | Self::Type | Self::Open)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Parameters ─────────────────────────────────────────────────

/// Scroll direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
}

impl ScrollDirection {
    /// Parse `up`/`down`, case-insensitively.
    pub fn from_word(word: &str) -> Option<Self> {
        if word.eq_ignore_ascii_case("up") {
            Some(Self::Up)
        } else if word.eq_ignore_ascii_case("down") {
            Some(Self::Down)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

impl fmt::Display for ScrollDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scroll parameters. The amount is always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollParams {
    pub direction: ScrollDirection,
    pub amount: u32,
}

impl ScrollParams {
    /// Build scroll parameters; a zero amount becomes [`DEFAULT_SCROLL_AMOUNT`].
    pub fn new(direction: ScrollDirection, amount: u32) -> Self {
        let amount = if amount == 0 {
            DEFAULT_SCROLL_AMOUNT
        } else {
            amount
        };
        Self { direction, amount }
    }

    /// Parse an optional amount string, falling back to the default on any failure.
    pub fn with_amount_text(direction: ScrollDirection, amount: Option<&str>) -> Self {
        let amount = amount
            .and_then(|a| a.trim().parse::<u32>().ok())
            .unwrap_or(DEFAULT_SCROLL_AMOUNT);
        Self::new(direction, amount)
    }
}

impl Default for ScrollParams {
    fn default() -> Self {
        Self::new(ScrollDirection::Down, DEFAULT_SCROLL_AMOUNT)
    }
}

/// Intent parameters; the shape depends on the intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Parameters {
    /// Target of a click, text to type, or thing to open.
    Target(String),
    Scroll(ScrollParams),
    /// Answer to a conversational utterance.
    Response { response: String },
}

impl fmt::Display for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Target(t) => f.write_str(t),
            Self::Scroll(s) => write!(f, "direction: {}, amount: {}", s.direction, s.amount),
            Self::Response { response } => write!(f, "response: {response}"),
        }
    }
}

// ── Resolution ─────────────────────────────────────────────────

/// One classified utterance.
///
/// Only the constructors below can build a value, so parameters are either
/// valid for the intent or absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    intent: Intent,
    parameters: Option<Parameters>,
}

impl Resolution {
    pub fn unknown() -> Self {
        Self {
            intent: Intent::Unknown,
            parameters: None,
        }
    }

    pub fn help() -> Self {
        Self {
            intent: Intent::Help,
            parameters: None,
        }
    }

    pub fn exit() -> Self {
        Self {
            intent: Intent::Exit,
            parameters: None,
        }
    }

    pub fn scroll(params: ScrollParams) -> Self {
        Self {
            intent: Intent::Scroll,
            parameters: Some(Parameters::Scroll(params)),
        }
    }

    /// A click, type or open command. Returns `None` for other intents or a
    /// blank target.
    pub fn targeted(intent: Intent, target: &str) -> Option<Self> {
        let target = target.trim();
        if !intent.takes_target() || target.is_empty() {
            return None;
        }
        Some(Self {
            intent,
            parameters: Some(Parameters::Target(target.to_owned())),
        })
    }

    /// A conversational answer. A blank answer leaves the parameters absent.
    pub fn conversation(response: &str) -> Self {
        let response = response.trim();
        Self {
            intent: Intent::Conversation,
            parameters: (!response.is_empty()).then(|| Parameters::Response {
                response: response.to_owned(),
            }),
        }
    }

    /// Build a parameterless resolution for `help`, `exit` or `unknown`.
    pub fn bare(intent: Intent) -> Option<Self> {
        match intent {
            Intent::Help => Some(Self::help()),
            Intent::Exit => Some(Self::exit()),
            Intent::Unknown => Some(Self::unknown()),
            _ => None,
        }
    }

    pub fn intent(&self) -> Intent {
        self.intent
    }

    pub fn parameters(&self) -> Option<&Parameters> {
        self.parameters.as_ref()
    }

    /// Target text for click/type/open.
    pub fn target(&self) -> Option<&str> {
        match &self.parameters {
            Some(Parameters::Target(t)) => Some(t),
            _ => None,
        }
    }

    pub fn scroll_params(&self) -> Option<ScrollParams> {
        match &self.parameters {
            Some(Parameters::Scroll(s)) => Some(*s),
            _ => None,
        }
    }

    /// Conversational answer, if any.
    pub fn response(&self) -> Option<&str> {
        match &self.parameters {
            Some(Parameters::Response { response }) => Some(response),
            _ => None,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parameters {
            Some(p) => write!(f, "({}, {p})", self.intent),
            None => write!(f, "({}, none)", self.intent),
        }
    }
}

// ── Strategy traits ────────────────────────────────────────────

/// Produces spoken confirmation text for a resolved intent.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// Text to speak for `intent` (a wire name such as `"click"` or a rule
    /// key such as `"greeting"`). Never fails; falls back to canned text.
    async fn generate_response(&self, intent: &str, parameters: Option<&Parameters>) -> String;
}

/// A strategy that classifies utterances.
#[async_trait]
pub trait IntentResolver: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Classify `text`. Never fails; an unclassifiable utterance is
    /// [`Intent::Unknown`].
    async fn process_text(&self, text: &str) -> Resolution;

    /// Confirmation text capability, when this strategy has one.
    fn responder(&self) -> Option<&dyn ResponseGenerator> {
        None
    }

    /// Stop background work. Safe to call more than once.
    async fn shutdown(&self) {}
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn intent_names_round_trip() {
        for intent in Intent::COMMANDS {
            assert_eq!(Intent::from_name(intent.as_str()), Some(intent));
        }
        assert_eq!(Intent::from_name(" Conversation "), Some(Intent::Conversation));
        assert_eq!(Intent::from_name("dance"), None);
    }

    #[test]
    fn targeted_rejects_blank_and_untargeted() {
        assert!(Resolution::targeted(Intent::Click, "   ").is_none());
        assert!(Resolution::targeted(Intent::Scroll, "down").is_none());

        let r = Resolution::targeted(Intent::Open, " youtube.com ").unwrap();
        assert_eq!(r.intent(), Intent::Open);
        assert_eq!(r.target(), Some("youtube.com"));
    }

    #[test]
    fn zero_scroll_amount_uses_default() {
        let p = ScrollParams::new(ScrollDirection::Up, 0);
        assert_eq!(p.amount, DEFAULT_SCROLL_AMOUNT);
    }

    #[test]
    fn unusable_amount_text_uses_default() {
        for text in ["abc", "-3", "99999999999", ""] {
            let p = ScrollParams::with_amount_text(ScrollDirection::Down, Some(text));
            assert_eq!(p.amount, DEFAULT_SCROLL_AMOUNT, "amount text {text:?}");
        }
        let p = ScrollParams::with_amount_text(ScrollDirection::Down, Some("12"));
        assert_eq!(p.amount, 12);
    }

    #[test]
    fn blank_conversation_has_no_parameters() {
        let r = Resolution::conversation("  ");
        assert_eq!(r.intent(), Intent::Conversation);
        assert!(r.parameters().is_none());

        let r = Resolution::conversation("Paris.");
        assert_eq!(r.response(), Some("Paris."));
    }

    #[test]
    fn bare_only_for_parameterless_intents() {
        assert_eq!(Resolution::bare(Intent::Help), Some(Resolution::help()));
        assert!(Resolution::bare(Intent::Click).is_none());
    }

    #[test]
    fn display_includes_parameters() {
        let r = Resolution::scroll(ScrollParams::new(ScrollDirection::Up, 10));
        assert_eq!(r.to_string(), "(scroll, direction: up, amount: 10)");
        assert_eq!(Resolution::exit().to_string(), "(exit, none)");
    }
}
