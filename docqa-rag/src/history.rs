//! Bounded history of answered questions.

use std::collections::VecDeque;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Maximum number of entries kept in a [`SearchHistory`].
pub const HISTORY_CAPACITY: usize = 10;

/// One answered question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHistoryEntry {
    /// The question as asked.
    pub question: String,
    /// The trimmed answer.
    pub answer: String,
    /// Id of the best-matching document used as context.
    pub source_id: String,
    /// Local wall-clock time, `HH:MM:SS`.
    pub timestamp: String,
}

impl SearchHistoryEntry {
    /// Create an entry stamped with the current local time.
    pub fn new(
        question: impl Into<String>,
        answer: impl Into<String>,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            source_id: source_id.into(),
            timestamp: Local::now().format("%H:%M:%S").to_string(),
        }
    }
}

/// The most recent [`HISTORY_CAPACITY`] answered questions, newest first.
#[derive(Debug, Default)]
pub struct SearchHistory {
    entries: RwLock<VecDeque<SearchHistoryEntry>>,
}

impl SearchHistory {
    /// An empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `entry` as the newest, evicting the oldest beyond capacity.
    pub async fn record(&self, entry: SearchHistoryEntry) {
        let mut entries = self.entries.write().await;
        entries.push_front(entry);
        entries.truncate(HISTORY_CAPACITY);
    }

    /// All entries, newest first.
    pub async fn list(&self) -> Vec<SearchHistoryEntry> {
        self.entries.read().await.iter().cloned().collect()
    }

    /// Number of entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// True when nothing has been recorded since the last clear.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Remove every entry.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}
