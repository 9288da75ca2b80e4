//! Vector index trait for storing and searching embedded documents.

use async_trait::async_trait;

use crate::document::{QueryResult, VectorEntry};
use crate::error::Result;

/// What to search a [`VectorIndex`] with.
#[derive(Debug, Clone, Copy)]
pub enum QueryInput<'a> {
    /// Raw text, embedded by the index with its own embedding provider.
    Text(&'a str),
    /// A precomputed query embedding.
    Vector(&'a [f32]),
}

/// A storage backend for embedded documents with nearest-neighbour search.
///
/// Implementations manage named collections of [`VectorEntry`]s keyed by id.
/// Distances are backend-defined; lower always means more similar.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{InMemoryVectorIndex, QueryInput, VectorIndex};
///
/// let index = InMemoryVectorIndex::new();
/// index.create_collection("docs", 512).await?;
/// index.add("docs", entry).await?;
/// let result = index.query("docs", QueryInput::Vector(&query_embedding), 3).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create a named collection. No-op if it already exists.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Delete a named collection and all its entries. No-op if it is absent.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Insert an entry, replacing any entry with the same id.
    async fn add(&self, collection: &str, entry: VectorEntry) -> Result<()>;

    /// Remove the entry with the given id. Unknown ids are ignored.
    async fn delete(&self, collection: &str, id: &str) -> Result<()>;

    /// Remove every entry while keeping the collection.
    async fn delete_all(&self, collection: &str) -> Result<()>;

    /// Return the ids of all entries in the collection.
    async fn ids(&self, collection: &str) -> Result<Vec<String>>;

    /// Fetch a single entry by id.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<VectorEntry>>;

    /// Return up to `top_k` nearest entries, ordered by ascending distance.
    async fn query(
        &self,
        collection: &str,
        input: QueryInput<'_>,
        top_k: usize,
    ) -> Result<QueryResult>;
}
