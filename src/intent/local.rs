//! Offline strategies: patterns first, then a grammatical parse or keywords.

use super::parse::{self, ParsedText, number_value};
use super::patterns::PatternMatcher;
use super::vocabulary::{VERB_INTENTS, intent_for_verb};
use super::{Intent, IntentResolver, Resolution, ScrollDirection, ScrollParams};
use crate::error::Result;
use async_trait::async_trait;
use tracing::debug;

/// Resolve a parsed utterance from its verbs and objects.
///
/// Verbs are tried in sentence order. A click, type or open verb needs an
/// object and is skipped without one.
pub fn resolve_parsed(parsed: &ParsedText) -> Resolution {
    for verb in parsed.verbs() {
        let Some(intent) = intent_for_verb(verb) else {
            continue;
        };
        match intent {
            Intent::Click | Intent::Type | Intent::Open => {
                if let Some(resolution) = parsed
                    .objects()
                    .first()
                    .and_then(|object| Resolution::targeted(intent, object))
                {
                    return resolution;
                }
            }
            Intent::Scroll => return Resolution::scroll(scroll_from_tokens(parsed)),
            Intent::Help => return Resolution::help(),
            Intent::Exit => return Resolution::exit(),
            Intent::Conversation | Intent::Unknown => {}
        }
    }
    Resolution::unknown()
}

/// Direction and amount from the whole utterance; the last mention wins.
fn scroll_from_tokens(parsed: &ParsedText) -> ScrollParams {
    let mut direction = ScrollDirection::Down;
    let mut amount = None;
    for token in parsed.tokens() {
        if let Some(d) = ScrollDirection::from_word(&token.lemma) {
            direction = d;
        } else if let Some(n) = number_value(&token.lemma).filter(|n| *n > 0) {
            amount = Some(n);
        }
    }
    match amount {
        Some(n) => ScrollParams::new(direction, n),
        None => ScrollParams::new(direction, super::DEFAULT_SCROLL_AMOUNT),
    }
}

/// Keyword spotting used when no parser is available.
///
/// Verbs are checked in vocabulary order. For click, type and open the word
/// right after the verb is the target; if the verb is not a whole word or is
/// the last word, the next verb is tried.
pub fn resolve_keywords(text: &str) -> Resolution {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();

    for (verb, intent) in VERB_INTENTS {
        if !lower.contains(verb) {
            continue;
        }
        match intent {
            Intent::Click | Intent::Type | Intent::Open => {
                let next = words
                    .iter()
                    .position(|w| w == verb)
                    .and_then(|idx| words.get(idx + 1));
                if let Some(resolution) =
                    next.and_then(|object| Resolution::targeted(*intent, object))
                {
                    return resolution;
                }
            }
            Intent::Scroll => {
                let direction = if words.contains(&"up") {
                    ScrollDirection::Up
                } else {
                    ScrollDirection::Down
                };
                return Resolution::scroll(ScrollParams::new(
                    direction,
                    super::DEFAULT_SCROLL_AMOUNT,
                ));
            }
            Intent::Help => return Resolution::help(),
            Intent::Exit => return Resolution::exit(),
            Intent::Conversation | Intent::Unknown => {}
        }
    }
    Resolution::unknown()
}

// ── Resolvers ──────────────────────────────────────────────────

/// Patterns, then the rule-based parse.
pub struct LocalParseResolver {
    patterns: PatternMatcher,
}

impl LocalParseResolver {
    /// # Errors
    ///
    /// Returns an error if the pattern table fails to compile.
    pub fn new() -> Result<Self> {
        Ok(Self {
            patterns: PatternMatcher::new()?,
        })
    }
}

#[async_trait]
impl IntentResolver for LocalParseResolver {
    fn name(&self) -> &'static str {
        "local-parse"
    }

    async fn process_text(&self, text: &str) -> Resolution {
        if let Some(resolution) = self.patterns.match_text(text) {
            return resolution;
        }
        let parsed = parse::parse(text);
        let resolution = resolve_parsed(&parsed);
        debug!(%resolution, "resolved by parse");
        resolution
    }
}

/// Patterns, then keyword spotting.
pub struct KeywordResolver {
    patterns: PatternMatcher,
}

impl KeywordResolver {
    /// # Errors
    ///
    /// Returns an error if the pattern table fails to compile.
    pub fn new() -> Result<Self> {
        Ok(Self {
            patterns: PatternMatcher::new()?,
        })
    }
}

#[async_trait]
impl IntentResolver for KeywordResolver {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn process_text(&self, text: &str) -> Resolution {
        if let Some(resolution) = self.patterns.match_text(text) {
            return resolution;
        }
        let resolution = resolve_keywords(text);
        debug!(%resolution, "resolved by keywords");
        resolution
    }
}
