//! Verb vocabulary shared by every strategy.
//!
//! The local parse, the keyword fallback and the remote prompt all read this
//! table, so adding a verb here teaches all three.

use super::Intent;

/// Command verbs and the intent each one selects, in scan order.
pub const VERB_INTENTS: &[(&str, Intent)] = &[
    ("click", Intent::Click),
    ("press", Intent::Click),
    ("select", Intent::Click),
    ("choose", Intent::Click),
    ("tap", Intent::Click),
    ("type", Intent::Type),
    ("enter", Intent::Type),
    ("input", Intent::Type),
    ("write", Intent::Type),
    ("scroll", Intent::Scroll),
    ("move", Intent::Scroll),
    ("open", Intent::Open),
    ("launch", Intent::Open),
    ("start", Intent::Open),
    ("go", Intent::Open),
    ("navigate", Intent::Open),
    ("help", Intent::Help),
    ("exit", Intent::Exit),
    ("quit", Intent::Exit),
    ("close", Intent::Exit),
];

/// Intent selected by a verb lemma.
pub fn intent_for_verb(lemma: &str) -> Option<Intent> {
    VERB_INTENTS
        .iter()
        .find(|(verb, _)| *verb == lemma)
        .map(|(_, intent)| *intent)
}

/// Verbs that select `intent`.
pub fn verbs_for(intent: Intent) -> impl Iterator<Item = &'static str> {
    VERB_INTENTS
        .iter()
        .filter(move |(_, i)| *i == intent)
        .map(|(verb, _)| *verb)
}

/// One line per command intent listing its verbs, for prompts and help text.
pub fn describe_commands() -> String {
    Intent::COMMANDS
        .iter()
        .map(|intent| {
            let verbs: Vec<&str> = verbs_for(*intent).collect();
            format!("- {}: {}", intent, verbs.join(", "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}
