//! Session-scoped state: documents, search history and the query pipeline.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::config::RagConfig;
use crate::convert::ConverterRegistry;
use crate::document::DocumentRecord;
use crate::embedding::EmbeddingProvider;
use crate::error::{GenerationFailure, IngestError, RagError, Result};
use crate::generator::AnswerGenerator;
use crate::history::{SearchHistory, SearchHistoryEntry};
use crate::knowledge::{IngestReport, KnowledgeBase, Reconcile, UploadedFile};
use crate::pipeline::{Answer, QueryPipeline};
use crate::vectorstore::VectorIndex;

/// Everything one user session owns.
///
/// Created at session start with [`Session::builder`] and discarded at the
/// end. Nothing here is global; two sessions built over separate indexes are
/// fully independent.
pub struct Session {
    id: String,
    started_at: DateTime<Utc>,
    knowledge_base: Arc<KnowledgeBase>,
    history: Arc<SearchHistory>,
    pipeline: QueryPipeline,
}

impl Session {
    /// Create a new [`SessionBuilder`].
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// Session id (UUID v4).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// When the session was created.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// The knowledge base façade.
    pub fn knowledge_base(&self) -> &Arc<KnowledgeBase> {
        &self.knowledge_base
    }

    /// The query pipeline.
    pub fn pipeline(&self) -> &QueryPipeline {
        &self.pipeline
    }

    /// See [`KnowledgeBase::ingest`].
    ///
    /// # Errors
    ///
    /// See [`KnowledgeBase::ingest`].
    pub async fn ingest(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> std::result::Result<DocumentRecord, IngestError> {
        self.knowledge_base.ingest(filename, bytes).await
    }

    /// See [`KnowledgeBase::ingest_batch`].
    pub async fn ingest_batch(&self, files: &[UploadedFile]) -> IngestReport {
        self.knowledge_base.ingest_batch(files).await
    }

    /// See [`KnowledgeBase::delete`].
    ///
    /// # Errors
    ///
    /// See [`KnowledgeBase::delete`].
    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.knowledge_base.delete(id).await
    }

    /// Documents in upload order.
    pub async fn documents(&self) -> Vec<DocumentRecord> {
        self.knowledge_base.documents().await
    }

    /// See [`QueryPipeline::answer`].
    ///
    /// # Errors
    ///
    /// See [`QueryPipeline::answer`].
    pub async fn ask(&self, question: &str) -> std::result::Result<Answer, GenerationFailure> {
        self.pipeline.answer(question).await
    }

    /// Recent answered questions, newest first.
    pub async fn history(&self) -> Vec<SearchHistoryEntry> {
        self.history.list().await
    }

    /// Forget all recent questions.
    pub async fn clear_history(&self) {
        self.history.clear().await;
        info!(session.id = %self.id, "cleared search history");
    }

    /// See [`KnowledgeBase::reconcile`].
    ///
    /// # Errors
    ///
    /// See [`KnowledgeBase::reconcile`].
    pub async fn reconcile(&self, policy: Reconcile) -> Result<Vec<String>> {
        self.knowledge_base.reconcile(policy).await
    }
}

/// Builder for constructing a [`Session`].
///
/// `embedding_provider`, `vector_index` and `generator` are required.
#[derive(Default)]
pub struct SessionBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_index: Option<Arc<dyn VectorIndex>>,
    generator: Option<Arc<dyn AnswerGenerator>>,
    converters: Option<ConverterRegistry>,
}

impl SessionBuilder {
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

    /// Set the answer generator.
    pub fn generator(mut self, generator: Arc<dyn AnswerGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Set the converter table.
    pub fn converters(mut self, converters: ConverterRegistry) -> Self {
        self.converters = Some(converters);
        self
    }

    /// Build the session, creating the index collection if absent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or the
    /// configuration is invalid, or the index error if the collection cannot
    /// be created.
    pub async fn build(self) -> Result<Session> {
        let generator = self
            .generator
            .ok_or_else(|| RagError::ConfigError("generator is required".to_string()))?;

        let mut knowledge_base = KnowledgeBase::builder();
        if let Some(config) = self.config {
            knowledge_base = knowledge_base.config(config);
        }
        if let Some(provider) = self.embedding_provider {
            knowledge_base = knowledge_base.embedding_provider(provider);
        }
        if let Some(index) = self.vector_index {
            knowledge_base = knowledge_base.vector_index(index);
        }
        if let Some(converters) = self.converters {
            knowledge_base = knowledge_base.converters(converters);
        }
        let knowledge_base = Arc::new(knowledge_base.build().await?);

        let history = Arc::new(SearchHistory::new());
        let pipeline = QueryPipeline::builder()
            .knowledge_base(Arc::clone(&knowledge_base))
            .generator(generator)
            .history(Arc::clone(&history))
            .build()?;

        let id = Uuid::new_v4().to_string();
        info!(session.id = %id, collection = %knowledge_base.config().collection, "session started");

        Ok(Session { id, started_at: Utc::now(), knowledge_base, history, pipeline })
    }
}
