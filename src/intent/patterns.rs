//! Ordered regular-expression matching for the six command intents.

use super::{Intent, Resolution, ScrollDirection, ScrollParams};
use crate::error::{BuddyError, Result};
use regex::{Regex, RegexBuilder};
use tracing::debug;

/// Patterns per intent. Intent order and list order are the match precedence.
const PATTERNS: &[(Intent, &[&str])] = &[
    (
        Intent::Click,
        &[
            r"click\s+(?:on\s+)?(.+)",
            r"press\s+(?:on\s+)?(.+)",
            r"select\s+(.+)",
            r"choose\s+(.+)",
            r"tap\s+(?:on\s+)?(.+)",
        ],
    ),
    (
        Intent::Type,
        &[r"type\s+(.+)", r"enter\s+(.+)", r"input\s+(.+)", r"write\s+(.+)"],
    ),
    (
        Intent::Scroll,
        &[
            r"scroll\s+(up|down)(?:\s+(\d+))?",
            r"move\s+(up|down)(?:\s+(\d+))?",
        ],
    ),
    (
        Intent::Open,
        &[
            r"open\s+(.+)",
            r"launch\s+(.+)",
            r"start\s+(.+)",
            r"go\s+to\s+(.+)",
            r"navigate\s+to\s+(.+)",
        ],
    ),
    (
        Intent::Help,
        &[r"help", r"assist", r"guide", r"what\s+can\s+you\s+do"],
    ),
    (
        Intent::Exit,
        &[r"exit", r"quit", r"close", r"bye", r"goodbye"],
    ),
];

/// Deterministic first-match classifier.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    rules: Vec<(Intent, Vec<Regex>)>,
}

impl PatternMatcher {
    /// Compile the pattern table.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern fails to compile.
    pub fn new() -> Result<Self> {
        let rules = PATTERNS
            .iter()
            .map(|(intent, patterns)| {
                let compiled = patterns
                    .iter()
                    .map(|p| {
                        RegexBuilder::new(p)
                            .case_insensitive(true)
                            .build()
                            .map_err(|e| BuddyError::Intent(format!("bad pattern {p:?}: {e}")))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok((*intent, compiled))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Classify `text`, or `None` when no pattern matches.
    pub fn match_text(&self, text: &str) -> Option<Resolution> {
        for (intent, patterns) in &self.rules {
            for pattern in patterns {
                let Some(caps) = pattern.captures(text) else {
                    continue;
                };
                let resolution = match intent {
                    Intent::Scroll => {
                        let direction = caps
                            .get(1)
                            .and_then(|m| ScrollDirection::from_word(m.as_str()))
                            .unwrap_or(ScrollDirection::Down);
                        let amount = caps.get(2).map(|m| m.as_str());
                        Some(Resolution::scroll(ScrollParams::with_amount_text(
                            direction, amount,
                        )))
                    }
                    Intent::Click | Intent::Type | Intent::Open => caps
                        .get(1)
                        .and_then(|m| Resolution::targeted(*intent, m.as_str())),
                    other => Resolution::bare(*other),
                };
                if let Some(resolution) = resolution {
                    debug!(pattern = pattern.as_str(), %resolution, "pattern matched");
                    return Some(resolution);
                }
            }
        }
        None
    }
}
