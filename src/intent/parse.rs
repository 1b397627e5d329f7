//! Small rule-based English parser for command utterances.
//!
//! Produces tokens with a lemma, a coarse part of speech, and an object
//! dependency label. It knows the closed word classes by list, recognises
//! verbs through a lexicon plus inflection stripping, and treats every other
//! word as a noun. That is enough to pull "the verb" and "its object" out of
//! short imperative sentences such as "could you please start the terminal".

use super::vocabulary::VERB_INTENTS;

// ── Types ──────────────────────────────────────────────────────

/// Coarse part-of-speech tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartOfSpeech {
    Verb,
    /// Modal or auxiliary (`can`, `would`, `please`, `to`).
    Auxiliary,
    Noun,
    Pronoun,
    Determiner,
    Adjective,
    Adposition,
    /// Directional particle (`up`, `down`).
    Particle,
    Adverb,
    Number,
    Conjunction,
}

/// Object relation of a token to the preceding verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    /// Head of the noun phrase right after a verb.
    DirectObject,
    /// Head of the noun phrase after a preposition.
    PrepositionalObject,
    None,
}

/// One parsed word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub lemma: String,
    pub pos: PartOfSpeech,
    pub dep: Dependency,
}

/// Result of parsing one utterance.
#[derive(Debug, Clone, Default)]
pub struct ParsedText {
    tokens: Vec<Token>,
    /// Object phrases in sentence order, without determiners.
    objects: Vec<String>,
}

impl ParsedText {
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Verb lemmas in sentence order.
    pub fn verbs(&self) -> impl Iterator<Item = &str> {
        self.tokens
            .iter()
            .filter(|t| t.pos == PartOfSpeech::Verb)
            .map(|t| t.lemma.as_str())
    }

    /// Direct and prepositional object phrases in sentence order.
    pub fn objects(&self) -> &[String] {
        &self.objects
    }
}

// ── Lexicon ────────────────────────────────────────────────────

const DETERMINERS: &[&str] = &[
    "the", "a", "an", "this", "that", "these", "those", "my", "your", "his", "her", "its", "our",
    "their", "some", "any", "every", "each", "another",
];

const ADPOSITIONS: &[&str] = &[
    "on", "in", "at", "to", "into", "onto", "for", "with", "from", "of", "by", "about", "over",
    "under", "through", "inside", "within",
];

const PRONOUNS: &[&str] = &[
    "i", "you", "it", "me", "we", "they", "he", "she", "him", "us", "them", "something",
    "anything", "everything",
];

const AUXILIARIES: &[&str] = &[
    "can", "could", "would", "will", "should", "shall", "may", "might", "must", "please", "do",
    "does", "did", "let", "lets", "let's", "be", "is", "are", "am", "was", "were",
];

const CONJUNCTIONS: &[&str] = &["and", "or", "but", "then"];

const PARTICLES: &[&str] = &["up", "down"];

const ADVERBS: &[&str] = &[
    "now", "again", "just", "quickly", "here", "there", "right", "away", "back", "too", "also",
];

const ADJECTIVES: &[&str] = &[
    "new", "big", "small", "red", "blue", "green", "white", "black", "next", "previous", "last",
    "first", "second", "top", "bottom", "left", "main", "other", "same",
];

/// Non-command verbs, so sentences like "I want to open mail" parse.
const OTHER_VERBS: &[&str] = &[
    "want", "need", "like", "see", "show", "find", "get", "make", "tell", "try", "use", "look",
    "put", "give", "take", "switch", "turn", "stop", "run", "search", "check", "read", "hit",
];

const NUMBER_WORDS: &[(&str, u32)] = &[
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("twenty", 20),
];

fn is_known_verb(word: &str) -> bool {
    VERB_INTENTS.iter().any(|(v, _)| *v == word) || OTHER_VERBS.contains(&word)
}

/// Reduce an inflected verb form to a known verb, if any.
fn verb_lemma(word: &str) -> Option<String> {
    if is_known_verb(word) {
        return Some(word.to_owned());
    }
    let mut candidates: Vec<String> = Vec::new();
    for suffix in ["ing", "ed", "es", "s"] {
        if let Some(stem) = word.strip_suffix(suffix) {
            if stem.len() < 2 {
                continue;
            }
            candidates.push(stem.to_owned());
            // typing -> type, closed -> close
            candidates.push(format!("{stem}e"));
            // tapped -> tap
            let mut tail = stem.chars().rev();
            if let (Some(last), Some(before)) = (tail.next(), tail.next()) {
                if last == before {
                    candidates.push(stem[..stem.len() - last.len_utf8()].to_owned());
                }
            }
        }
    }
    candidates.into_iter().find(|c| is_known_verb(c))
}

/// Numeric value of a token (`"10"`, `"ten"`).
pub fn number_value(word: &str) -> Option<u32> {
    if word.chars().all(|c| c.is_ascii_digit()) {
        return word.parse().ok();
    }
    NUMBER_WORDS
        .iter()
        .find(|(w, _)| *w == word)
        .map(|(_, n)| *n)
}

/// Split on whitespace and strip surrounding punctuation, keeping inner
/// dots and hyphens (`youtube.com`, `e-mail`).
fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_owned()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

// ── Parser ─────────────────────────────────────────────────────

/// Parse an utterance.
pub fn parse(text: &str) -> ParsedText {
    let words = tokenize(text);
    let mut tokens: Vec<Token> = Vec::with_capacity(words.len());

    for word in words {
        let lower = word.to_lowercase();
        let prev = tokens.last().map(|t: &Token| t.pos);
        let (pos, lemma) = tag(&lower, prev);
        tokens.push(Token {
            text: word,
            lemma,
            pos,
            dep: Dependency::None,
        });
    }

    let objects = attach_objects(&mut tokens);
    ParsedText { tokens, objects }
}

/// Tag one lower-cased word given the previous tag.
fn tag(word: &str, prev: Option<PartOfSpeech>) -> (PartOfSpeech, String) {
    let closed = if DETERMINERS.contains(&word) {
        Some(PartOfSpeech::Determiner)
    } else if PRONOUNS.contains(&word) {
        Some(PartOfSpeech::Pronoun)
    } else if AUXILIARIES.contains(&word) {
        Some(PartOfSpeech::Auxiliary)
    } else if CONJUNCTIONS.contains(&word) {
        Some(PartOfSpeech::Conjunction)
    } else if PARTICLES.contains(&word) {
        Some(PartOfSpeech::Particle)
    } else if ADVERBS.contains(&word) || word.ends_with("ly") {
        Some(PartOfSpeech::Adverb)
    } else if number_value(word).is_some() {
        Some(PartOfSpeech::Number)
    } else {
        None
    };
    if let Some(pos) = closed {
        return (pos, word.to_owned());
    }

    // "to" is an infinitive marker before a verb and a preposition elsewhere;
    // it is tagged as an adposition here and re-read when a verb follows.
    if ADPOSITIONS.contains(&word) {
        return (PartOfSpeech::Adposition, word.to_owned());
    }

    // A verb form after a determiner or adjective is a noun: "the start menu".
    let nominal_context = matches!(
        prev,
        Some(PartOfSpeech::Determiner | PartOfSpeech::Adjective | PartOfSpeech::Adposition)
    );
    if !nominal_context {
        if let Some(lemma) = verb_lemma(word) {
            return (PartOfSpeech::Verb, lemma);
        }
    }

    if ADJECTIVES.contains(&word) {
        return (PartOfSpeech::Adjective, word.to_owned());
    }
    (PartOfSpeech::Noun, word.to_owned())
}

/// Label object heads and collect object phrases.
///
/// After a verb, the first noun phrase is its direct object. A noun phrase
/// following a preposition is a prepositional object.
fn attach_objects(tokens: &mut [Token]) -> Vec<String> {
    let mut objects = Vec::new();
    let mut relation: Option<Dependency> = None;
    let mut i = 0;

    while i < tokens.len() {
        match tokens[i].pos {
            PartOfSpeech::Verb => {
                relation = Some(Dependency::DirectObject);
                i += 1;
            }
            PartOfSpeech::Adposition => {
                relation = Some(Dependency::PrepositionalObject);
                i += 1;
            }
            PartOfSpeech::Determiner
            | PartOfSpeech::Adjective
            | PartOfSpeech::Noun
            | PartOfSpeech::Number
                if relation.is_some() =>
            {
                let start = i;
                while i < tokens.len()
                    && matches!(
                        tokens[i].pos,
                        PartOfSpeech::Determiner
                            | PartOfSpeech::Adjective
                            | PartOfSpeech::Noun
                            | PartOfSpeech::Number
                    )
                {
                    i += 1;
                }
                let phrase = &tokens[start..i];
                let Some(head) = phrase.iter().rposition(|t| t.pos == PartOfSpeech::Noun) else {
                    // Determiners and numbers alone ("scroll down 3") are not objects.
                    continue;
                };
                let text = phrase
                    .iter()
                    .filter(|t| t.pos != PartOfSpeech::Determiner)
                    .map(|t| t.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                if let Some(dep) = relation.take() {
                    tokens[start + head].dep = dep;
                }
                objects.push(text);
            }
            PartOfSpeech::Conjunction => {
                relation = None;
                i += 1;
            }
            _ => i += 1,
        }
    }
    objects
}
