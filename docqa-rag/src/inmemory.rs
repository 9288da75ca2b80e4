//! In-memory vector index with brute-force nearest-neighbour search.
//!
//! This module provides [`InMemoryVectorIndex`], a vector index backed by a
//! map protected by a `tokio::sync::RwLock`. It can optionally mirror its
//! contents to a JSON snapshot on local disk so that entries survive process
//! restarts.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::document::{QueryResult, VectorEntry};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::{QueryInput, VectorIndex};

const BACKEND: &str = "InMemory";

/// How distances between embeddings are measured. Lower is always closer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Squared Euclidean distance. Ranges over `[0, 4]` for unit vectors.
    #[default]
    SquaredL2,
    /// Euclidean distance.
    L2,
    /// `1 - cosine similarity`. Ranges over `[0, 2]`.
    Cosine,
}

impl DistanceMetric {
    /// Distance between two vectors of equal length.
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::SquaredL2 => squared_l2(a, b),
            Self::L2 => squared_l2(a, b).sqrt(),
            Self::Cosine => 1.0 - cosine_similarity(a, b),
        }
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Collection {
    dimensions: usize,
    entries: BTreeMap<String, VectorEntry>,
}

impl Collection {
    fn check_dimensions(&self, name: &str, len: usize) -> Result<()> {
        if self.dimensions != 0 && len != self.dimensions {
            return Err(RagError::VectorStoreError {
                backend: BACKEND.to_string(),
                message: format!(
                    "collection '{name}' expects {} dimensions, got {len}",
                    self.dimensions
                ),
            });
        }
        Ok(())
    }
}

/// On-disk layout of a persisted index.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    metric: DistanceMetric,
    collections: BTreeMap<String, Collection>,
}

/// An in-memory vector index.
///
/// Collections are stored as nested maps: collection name → entry id → entry.
/// All operations are async-safe via `tokio::sync::RwLock`. Text queries are
/// embedded with the provider set through
/// [`with_embedding_provider`](Self::with_embedding_provider).
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{DistanceMetric, InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new().with_metric(DistanceMetric::Cosine);
/// index.create_collection("docs", 512).await?;
/// ```
pub struct InMemoryVectorIndex {
    collections: RwLock<HashMap<String, Collection>>,
    metric: DistanceMetric,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    snapshot_path: Option<PathBuf>,
}

impl Default for InMemoryVectorIndex {
    fn default() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            metric: DistanceMetric::default(),
            embedding_provider: None,
            snapshot_path: None,
        }
    }
}

impl InMemoryVectorIndex {
    /// Create a new empty, non-persistent index using squared L2 distance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an index mirrored to the JSON snapshot at `path`.
    ///
    /// Existing contents (and the metric they were stored with) are loaded if
    /// the file exists; otherwise the index starts empty and the file is
    /// created on the first write.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Io`] or [`RagError::Serialization`] if an existing
    /// snapshot cannot be read.
    pub async fn persistent(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let snapshot = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Snapshot>(&bytes).map_err(|e| {
                error!(path = %path.display(), error = %e, "corrupt index snapshot");
                RagError::from(e)
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Snapshot::default(),
            Err(e) => return Err(e.into()),
        };

        let entry_count: usize = snapshot.collections.values().map(|c| c.entries.len()).sum();
        info!(path = %path.display(), entry_count, "opened persistent vector index");

        Ok(Self {
            collections: RwLock::new(snapshot.collections.into_iter().collect()),
            metric: snapshot.metric,
            embedding_provider: None,
            snapshot_path: Some(path),
        })
    }

    /// Set the distance metric.
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Set the provider used to embed [`QueryInput::Text`] queries.
    pub fn with_embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// The configured distance metric.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn missing(collection: &str) -> RagError {
        RagError::VectorStoreError {
            backend: BACKEND.to_string(),
            message: format!("collection '{collection}' does not exist"),
        }
    }

    /// Replace collection `name` with `updated`, or drop it when `None`.
    ///
    /// With a snapshot configured the new state is written first and the
    /// in-memory map only changes once the write succeeded, so a failed write
    /// leaves the index exactly as it was.
    async fn commit(
        &self,
        collections: &mut HashMap<String, Collection>,
        name: &str,
        updated: Option<Collection>,
    ) -> Result<()> {
        if let Some(path) = &self.snapshot_path {
            let mut next: BTreeMap<String, Collection> = collections
                .iter()
                .filter(|(k, _)| k.as_str() != name)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            if let Some(collection) = &updated {
                next.insert(name.to_string(), collection.clone());
            }
            let snapshot = Snapshot { metric: self.metric, collections: next };
            write_snapshot(path, &snapshot).await.map_err(|e| {
                error!(
                    path = %path.display(),
                    collection = name,
                    error = %e,
                    "failed to persist vector index"
                );
                e
            })?;
        }
        match updated {
            Some(collection) => collections.insert(name.to_string(), collection),
            None => collections.remove(name),
        };
        Ok(())
    }

    async fn resolve_query(&self, input: QueryInput<'_>) -> Result<Vec<f32>> {
        match input {
            QueryInput::Vector(v) => Ok(v.to_vec()),
            QueryInput::Text(text) => {
                let provider =
                    self.embedding_provider.as_ref().ok_or_else(|| RagError::VectorStoreError {
                        backend: BACKEND.to_string(),
                        message: "text query requires an embedding provider".to_string(),
                    })?;
                provider.embed(text).await
            }
        }
    }
}

/// Write the snapshot next to its final location, then rename over it.
async fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let bytes = serde_json::to_vec(snapshot)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Ok(());
        }
        let created = Collection { dimensions, entries: BTreeMap::new() };
        self.commit(&mut collections, name, Some(created)).await?;
        debug!(collection = name, dimensions, "created collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            self.commit(&mut collections, name, None).await?;
        }
        Ok(())
    }

    async fn add(&self, collection: &str, entry: VectorEntry) -> Result<()> {
        let mut collections = self.collections.write().await;
        let mut store =
            collections.get(collection).cloned().ok_or_else(|| Self::missing(collection))?;
        store.check_dimensions(collection, entry.embedding.len())?;
        store.entries.insert(entry.id.clone(), entry);
        self.commit(&mut collections, collection, Some(store)).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        let current = collections.get(collection).ok_or_else(|| Self::missing(collection))?;
        if !current.entries.contains_key(id) {
            return Ok(());
        }
        let mut store = current.clone();
        store.entries.remove(id);
        self.commit(&mut collections, collection, Some(store)).await
    }

    async fn delete_all(&self, collection: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        let current = collections.get(collection).ok_or_else(|| Self::missing(collection))?;
        let cleared = Collection { dimensions: current.dimensions, entries: BTreeMap::new() };
        self.commit(&mut collections, collection, Some(cleared)).await
    }

    async fn ids(&self, collection: &str) -> Result<Vec<String>> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| Self::missing(collection))?;
        Ok(store.entries.keys().cloned().collect())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<VectorEntry>> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| Self::missing(collection))?;
        Ok(store.entries.get(id).cloned())
    }

    async fn query(
        &self,
        collection: &str,
        input: QueryInput<'_>,
        top_k: usize,
    ) -> Result<QueryResult> {
        let embedding = self.resolve_query(input).await?;

        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| Self::missing(collection))?;
        store.check_dimensions(collection, embedding.len())?;

        let mut scored: Vec<(String, String, f32)> = store
            .entries
            .values()
            .map(|entry| {
                let distance = self.metric.distance(&entry.embedding, &embedding);
                (entry.id.clone(), entry.text.clone(), distance)
            })
            .collect();

        scored.sort_by(|a, b| a.2.total_cmp(&b.2));
        scored.truncate(top_k);
        Ok(QueryResult::from_hits(scored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_agree_on_unit_vectors() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        assert!((DistanceMetric::SquaredL2.distance(&a, &b) - 2.0).abs() < 1e-6);
        assert!((DistanceMetric::L2.distance(&a, &b) - 2.0f32.sqrt()).abs() < 1e-6);
        assert!((DistanceMetric::Cosine.distance(&a, &b) - 1.0).abs() < 1e-6);
        assert_eq!(DistanceMetric::Cosine.distance(&a, &a), 0.0);
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn add_rejects_wrong_dimensions() {
        let index = InMemoryVectorIndex::new();
        index.create_collection("docs", 3).await.unwrap();
        let err = index
            .add("docs", VectorEntry { id: "a".into(), embedding: vec![1.0], text: "a".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::VectorStoreError { .. }));
    }

    #[tokio::test]
    async fn text_query_without_provider_fails() {
        let index = InMemoryVectorIndex::new();
        index.create_collection("docs", 0).await.unwrap();
        assert!(index.query("docs", QueryInput::Text("hi"), 1).await.is_err());
    }

    #[tokio::test]
    async fn failed_snapshot_write_keeps_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let index = InMemoryVectorIndex::persistent(&path).await.unwrap();
        index.create_collection("docs", 2).await.unwrap();
        index
            .add("docs", VectorEntry { id: "a".into(), embedding: vec![1.0, 0.0], text: "a".into() })
            .await
            .unwrap();

        // A directory in the way of the temporary file makes every write fail.
        std::fs::create_dir(dir.path().join("index.json.tmp")).unwrap();

        let b = VectorEntry { id: "b".into(), embedding: vec![0.0, 1.0], text: "b".into() };
        assert!(index.add("docs", b).await.is_err());
        assert!(index.delete("docs", "a").await.is_err());
        assert!(index.delete_all("docs").await.is_err());
        assert!(index.delete_collection("docs").await.is_err());
        assert_eq!(index.ids("docs").await.unwrap(), vec!["a".to_string()]);

        let reopened = InMemoryVectorIndex::persistent(&path).await.unwrap();
        assert_eq!(reopened.ids("docs").await.unwrap(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn create_collection_is_idempotent() {
        let index = InMemoryVectorIndex::new();
        index.create_collection("docs", 2).await.unwrap();
        index
            .add("docs", VectorEntry { id: "a".into(), embedding: vec![1.0, 0.0], text: "a".into() })
            .await
            .unwrap();
        index.create_collection("docs", 2).await.unwrap();
        assert_eq!(index.ids("docs").await.unwrap(), vec!["a".to_string()]);
    }
}
