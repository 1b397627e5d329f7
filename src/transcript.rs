//! Conversation transcript.
//!
//! Keeps the most recent user, assistant and system lines in a fixed-size
//! ring buffer and fans new entries out to any display subscribed to them.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use tokio::sync::broadcast;

/// Who produced a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
    System,
}

/// One recorded line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Local>,
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let who = match self.speaker {
            Speaker::User => "You",
            Speaker::Assistant => "Assistant",
            Speaker::System => "System",
        };
        write!(f, "[{}] {who}: {}", self.timestamp.format("%H:%M:%S"), self.text)
    }
}

/// Bounded, shareable message history.
#[derive(Debug)]
pub struct Transcript {
    entries: Mutex<VecDeque<Entry>>,
    capacity: usize,
    updates: broadcast::Sender<Entry>,
}

impl Transcript {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (updates, _) = broadcast::channel(64);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            updates,
        }
    }

    /// Append a line, evicting the oldest at capacity.
    pub fn record(&self, speaker: Speaker, text: impl Into<String>) -> Entry {
        let entry = Entry {
            speaker,
            text: text.into(),
            timestamp: Local::now(),
        };
        {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            if entries.len() >= self.capacity {
                entries.pop_front();
            }
            entries.push_back(entry.clone());
        }
        // No subscribers is fine.
        let _ = self.updates.send(entry.clone());
        entry
    }

    /// Receive every entry recorded from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Entry> {
        self.updates.subscribe()
    }

    /// All retained entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<Entry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// The last `n` entries, oldest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<Entry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new(crate::config::MIN_HISTORY)
    }
}
