//! Data types for documents, index entries and query results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::convert::DocumentFormat;

/// A converted document owned by the [`DocumentStore`](crate::store::DocumentStore).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentRecord {
    /// Unique identifier: the upload filename, or a generated id.
    pub id: String,
    /// The converted text (markdown or plain text).
    pub text: String,
    /// The format the text was converted from.
    pub format: DocumentFormat,
    /// Size of the original upload in bytes.
    pub size_bytes: usize,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl DocumentRecord {
    /// Number of whitespace-separated words in the text.
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    /// The first `max_chars` characters, with `...` appended when cut.
    pub fn preview(&self, max_chars: usize) -> String {
        match self.text.char_indices().nth(max_chars) {
            Some((cut, _)) => format!("{}...", &self.text[..cut]),
            None => self.text.clone(),
        }
    }
}

/// An embedded document as stored in a [`VectorIndex`](crate::vectorstore::VectorIndex).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorEntry {
    /// Same id as the originating [`DocumentRecord`].
    pub id: String,
    /// The vector embedding of `text`.
    pub embedding: Vec<f32>,
    /// The embedded text.
    pub text: String,
}

/// A single nearest-neighbour match borrowed from a [`QueryResult`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit<'a> {
    /// Entry id.
    pub id: &'a str,
    /// Entry text.
    pub text: &'a str,
    /// Distance to the query (lower is closer).
    pub distance: f32,
}

/// Nearest neighbours of a query, best match first.
///
/// The three sequences are co-indexed and always have the same length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    ids: Vec<String>,
    texts: Vec<String>,
    distances: Vec<f32>,
}

impl QueryResult {
    /// An empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a result from `(id, text, distance)` triples, sorting them by
    /// ascending distance.
    pub fn from_hits(mut hits: Vec<(String, String, f32)>) -> Self {
        hits.sort_by(|a, b| a.2.total_cmp(&b.2));
        let mut result = Self::new();
        for (id, text, distance) in hits {
            result.ids.push(id);
            result.texts.push(text);
            result.distances.push(distance);
        }
        result
    }

    /// Matched ids, best first.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Matched texts, co-indexed with [`ids`](Self::ids).
    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    /// Distances, ascending.
    pub fn distances(&self) -> &[f32] {
        &self.distances
    }

    /// Number of matches.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True when nothing matched.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Iterate over the matches, best first.
    pub fn iter(&self) -> impl Iterator<Item = Hit<'_>> {
        self.ids.iter().zip(&self.texts).zip(&self.distances).map(|((id, text), distance)| Hit {
            id,
            text,
            distance: *distance,
        })
    }
}
