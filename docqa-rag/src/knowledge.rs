//! Knowledge base façade over the document store and the vector index.
//!
//! [`KnowledgeBase`] is the only way to reach the [`DocumentStore`] and the
//! [`VectorIndex`] collection behind it. Every mutation updates both under a
//! single write lock, and queries run under the read lock, so no caller can
//! observe a document that exists in one structure but not the other.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{KnowledgeBase, RagConfig, HashingEmbeddingProvider, InMemoryVectorIndex};
//!
//! let kb = KnowledgeBase::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
//!     .vector_index(Arc::new(InMemoryVectorIndex::new()))
//!     .build()
//!     .await?;
//!
//! let report = kb.ingest_batch(&files).await;
//! println!("{} failed", report.failure_count());
//! ```

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::RagConfig;
use crate::convert::{ConverterRegistry, DocumentFormat, extension_of, unreadable};
use crate::document::{DocumentRecord, QueryResult, VectorEntry};
use crate::embedding::EmbeddingProvider;
use crate::error::{IngestError, RagError, Result};
use crate::store::DocumentStore;
use crate::vectorstore::{QueryInput, VectorIndex};

/// An uploaded file: its name and raw content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Original filename, including the extension.
    pub filename: String,
    /// Raw file content.
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Bundle a filename with its content.
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self { filename: filename.into(), bytes: bytes.into() }
    }
}

/// Summary line for one successfully ingested document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestedDocument {
    /// Document id.
    pub id: String,
    /// Words in the converted text.
    pub word_count: usize,
}

/// Outcome of [`KnowledgeBase::ingest_batch`]: one bad file never blocks the
/// others.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Documents added, in input order.
    pub ingested: Vec<IngestedDocument>,
    /// Per-file failures, in input order.
    pub failures: Vec<IngestError>,
}

impl IngestReport {
    /// Total words across the ingested documents.
    pub fn total_words(&self) -> usize {
        self.ingested.iter().map(|d| d.word_count).sum()
    }

    /// Number of files that failed.
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// True when every file was ingested.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// One human-readable message per failed file.
    pub fn failure_messages(&self) -> Vec<String> {
        self.failures.iter().map(ToString::to_string).collect()
    }
}

/// How [`KnowledgeBase::reconcile`] treats index entries with no matching
/// document record, as left behind by a persistent index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reconcile {
    /// Delete orphaned index entries.
    Prune,
    /// Recreate document records from the orphaned entries.
    Adopt,
}

/// Document store and vector index kept in step.
pub struct KnowledgeBase {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_index: Arc<dyn VectorIndex>,
    converters: ConverterRegistry,
    store: RwLock<DocumentStore>,
}

impl KnowledgeBase {
    /// Create a new [`KnowledgeBaseBuilder`].
    pub fn builder() -> KnowledgeBaseBuilder {
        KnowledgeBaseBuilder::default()
    }

    /// The active configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// The embedding provider used for documents and questions.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    fn collection(&self) -> &str {
        &self.config.collection
    }

    /// Validate, convert, embed and store one upload.
    ///
    /// Checks run in this order: size, extension, conversion, minimum text
    /// length. The converter is never called for a rejected extension.
    ///
    /// # Errors
    ///
    /// One [`IngestError`] variant per failed check. On
    /// [`IngestError::Indexing`] neither the store nor the index was changed.
    pub async fn ingest(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> std::result::Result<DocumentRecord, IngestError> {
        let filename = display_name(filename);

        let limit = self.config.max_upload_bytes;
        if bytes.len() > limit {
            warn!(filename = %filename, size = bytes.len(), limit, "rejected oversized upload");
            return Err(IngestError::TooLarge { filename, size: bytes.len(), limit });
        }

        let extension = extension_of(&filename);
        let Some(format) = DocumentFormat::from_extension(&extension) else {
            warn!(filename = %filename, extension = %extension, "rejected unsupported file type");
            return Err(IngestError::UnsupportedType { filename, extension });
        };

        let text = self.convert(&filename, format, bytes).await?;
        if text.trim().chars().count() < self.config.min_text_chars {
            warn!(filename = %filename, "conversion produced too little text");
            return Err(IngestError::EmptyOrCorrupt { filename });
        }

        let record = DocumentRecord {
            id: filename.clone(),
            text,
            format,
            size_bytes: bytes.len(),
            created_at: Utc::now(),
        };
        self.index_record(record)
            .await
            .map_err(|source| IngestError::Indexing { filename, source })
    }

    /// Ingest every file independently and summarise the outcome.
    pub async fn ingest_batch(&self, files: &[UploadedFile]) -> IngestReport {
        let mut report = IngestReport::default();
        for file in files {
            match self.ingest(&file.filename, &file.bytes).await {
                Ok(record) => report
                    .ingested
                    .push(IngestedDocument { word_count: record.word_count(), id: record.id }),
                Err(e) => report.failures.push(e),
            }
        }
        info!(
            ingested = report.ingested.len(),
            failed = report.failure_count(),
            total_words = report.total_words(),
            "batch ingestion finished"
        );
        report
    }

    /// Add already-extracted text. A UUID v4 id is generated when `id` is
    /// `None`.
    ///
    /// # Errors
    ///
    /// Returns the embedding or index error; nothing is stored in that case.
    pub async fn add_text(
        &self,
        id: Option<String>,
        text: impl Into<String>,
    ) -> Result<DocumentRecord> {
        let text = text.into();
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let format =
            DocumentFormat::from_extension(&extension_of(&id)).unwrap_or(DocumentFormat::Txt);
        let record =
            DocumentRecord { id, size_bytes: text.len(), text, format, created_at: Utc::now() };
        self.index_record(record).await
    }

    /// Remove a document from both the store and the index.
    ///
    /// Returns whether a record existed. Unknown ids are a no-op.
    ///
    /// # Errors
    ///
    /// Returns the index error; the store is left untouched in that case.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let mut store = self.store.write().await;
        self.vector_index.delete(self.collection(), id).await.map_err(|e| {
            error!(document.id = id, error = %e, "index delete failed");
            e
        })?;
        let existed = store.remove(id).is_some();
        info!(document.id = id, existed, "deleted document");
        Ok(existed)
    }

    /// Drop and recreate the index collection and clear the store.
    ///
    /// # Errors
    ///
    /// Returns the index error if the collection cannot be recreated.
    pub async fn reset(&self) -> Result<()> {
        let mut store = self.store.write().await;
        self.vector_index.delete_collection(self.collection()).await?;
        self.vector_index
            .create_collection(self.collection(), self.embedding_provider.dimensions())
            .await?;
        store.clear();
        info!(collection = self.collection(), "reset knowledge base");
        Ok(())
    }

    /// Resolve index entries that have no document record.
    ///
    /// Returns the affected ids.
    ///
    /// # Errors
    ///
    /// Returns the first index error encountered.
    pub async fn reconcile(&self, policy: Reconcile) -> Result<Vec<String>> {
        let mut store = self.store.write().await;
        let orphans: Vec<String> = self
            .vector_index
            .ids(self.collection())
            .await?
            .into_iter()
            .filter(|id| !store.contains(id))
            .collect();

        for id in &orphans {
            match policy {
                Reconcile::Prune => self.vector_index.delete(self.collection(), id).await?,
                Reconcile::Adopt => {
                    if let Some(entry) = self.vector_index.get(self.collection(), id).await? {
                        let format = DocumentFormat::from_extension(&extension_of(id))
                            .unwrap_or(DocumentFormat::Txt);
                        store.add(DocumentRecord {
                            id: entry.id,
                            size_bytes: entry.text.len(),
                            text: entry.text,
                            format,
                            created_at: Utc::now(),
                        });
                    }
                }
            }
        }

        info!(?policy, count = orphans.len(), "reconciled index with document store");
        Ok(orphans)
    }

    /// Nearest documents to `question`, best first.
    ///
    /// The question is embedded with the knowledge base's own provider.
    ///
    /// # Errors
    ///
    /// Returns the embedding or index error.
    pub async fn search(&self, question: &str, top_k: usize) -> Result<QueryResult> {
        let embedding = self.embedding_provider.embed(question).await?;
        let _store = self.store.read().await;
        self.vector_index.query(self.collection(), QueryInput::Vector(&embedding), top_k).await
    }

    /// All documents in upload order.
    pub async fn documents(&self) -> Vec<DocumentRecord> {
        self.store.read().await.list().to_vec()
    }

    /// A single document by id.
    pub async fn document(&self, id: &str) -> Option<DocumentRecord> {
        self.store.read().await.get(id).cloned()
    }

    /// Number of documents.
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    /// True when no documents are stored.
    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }

    /// Embed outside the lock, then insert into index and store together.
    async fn index_record(&self, record: DocumentRecord) -> Result<DocumentRecord> {
        let embedding = self.embedding_provider.embed(&record.text).await.map_err(|e| {
            error!(document.id = %record.id, error = %e, "embedding failed during ingestion");
            e
        })?;
        let entry =
            VectorEntry { id: record.id.clone(), embedding, text: record.text.clone() };

        let mut store = self.store.write().await;
        self.vector_index.add(self.collection(), entry).await.map_err(|e| {
            error!(document.id = %record.id, error = %e, "index insert failed during ingestion");
            e
        })?;
        let replaced = store.add(record.clone()).is_some();

        info!(
            document.id = %record.id,
            format = %record.format,
            word_count = record.word_count(),
            replaced,
            "ingested document"
        );
        Ok(record)
    }

    /// Stage the upload in a temporary file and run the converter on it.
    async fn convert(
        &self,
        filename: &str,
        format: DocumentFormat,
        bytes: &[u8],
    ) -> std::result::Result<String, IngestError> {
        let failed = |source| IngestError::ConversionFailed { filename: filename.to_string(), source };

        let staged = tempfile::Builder::new()
            .prefix("docqa-")
            .suffix(&format!(".{}", format.extension()))
            .tempfile()
            .map_err(|e| failed(unreadable(Path::new(filename), e)))?;
        tokio::fs::write(staged.path(), bytes)
            .await
            .map_err(|e| failed(unreadable(staged.path(), e)))?;

        self.converters.convert(staged.path(), format).await.map_err(|e| {
            error!(filename, error = %e, "conversion failed");
            failed(e)
        })
    }
}

/// The final path component of an upload name, trimmed.
fn display_name(filename: &str) -> String {
    let trimmed = filename.trim();
    Path::new(trimmed)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(trimmed)
        .to_string()
}

/// Builder for constructing a [`KnowledgeBase`].
///
/// `embedding_provider` and `vector_index` are required; `config` defaults to
/// [`RagConfig::default`] and `converters` to
/// [`ConverterRegistry::with_defaults`].
#[derive(Default)]
pub struct KnowledgeBaseBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_index: Option<Arc<dyn VectorIndex>>,
    converters: Option<ConverterRegistry>,
}

impl KnowledgeBaseBuilder {
    /// Set the configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector index backend.
    pub fn vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.vector_index = Some(index);
        self
    }

    /// Set the converter table.
    pub fn converters(mut self, converters: ConverterRegistry) -> Self {
        self.converters = Some(converters);
        self
    }

    /// Build the knowledge base, creating the index collection if absent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or the
    /// configuration is invalid, or the index error if the collection cannot
    /// be created.
    pub async fn build(self) -> Result<KnowledgeBase> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_index = self
            .vector_index
            .ok_or_else(|| RagError::ConfigError("vector_index is required".to_string()))?;
        let converters = self.converters.unwrap_or_else(ConverterRegistry::with_defaults);

        vector_index
            .create_collection(&config.collection, embedding_provider.dimensions())
            .await
            .map_err(|e| {
                error!(collection = %config.collection, error = %e, "failed to create collection");
                e
            })?;

        Ok(KnowledgeBase {
            config,
            embedding_provider,
            vector_index,
            converters,
            store: RwLock::new(DocumentStore::new()),
        })
    }
}
