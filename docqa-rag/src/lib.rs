//! Document question answering over a vector index.
//!
//! This crate provides:
//! - Upload validation and document-to-text conversion by file format
//! - A knowledge base keeping the document store and vector index in step
//! - A relevance gate, prompt builder and query pipeline for grounded answers
//! - A bounded search history and a session object tying it all together
//! - Batch export of documents to markdown files
//!
//! Embedding models, vector databases and text generators plug in through
//! the [`EmbeddingProvider`], [`VectorIndex`] and [`AnswerGenerator`] traits.

pub mod config;
pub mod convert;
pub mod document;
pub mod embedding;
pub mod error;
pub mod export;
pub mod gate;
pub mod generator;
pub mod history;
pub mod inmemory;
pub mod knowledge;
pub mod pipeline;
pub mod prompt;
pub mod session;
pub mod store;
pub mod vectorstore;

#[cfg(feature = "docx")]
pub mod docx;
#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "pdf")]
pub mod pdf;

pub use config::{RagConfig, RagConfigBuilder};
pub use convert::{
    CommandConverter, Converter, ConverterRegistry, DocumentFormat, PlainTextConverter,
};
pub use document::{DocumentRecord, Hit, QueryResult, VectorEntry};
pub use embedding::{EmbeddingProvider, HashingEmbeddingProvider};
pub use error::{
    ConversionError, ExportError, GenerationFailure, IngestError, QueryError, RagError, Result,
};
pub use export::{ExportReport, MarkdownExporter};
pub use gate::{RelevanceGate, gate};
pub use generator::AnswerGenerator;
pub use history::{HISTORY_CAPACITY, SearchHistory, SearchHistoryEntry};
pub use inmemory::{DistanceMetric, InMemoryVectorIndex};
pub use knowledge::{
    IngestReport, IngestedDocument, KnowledgeBase, KnowledgeBaseBuilder, Reconcile, UploadedFile,
};
pub use pipeline::{
    Answer, AnswerOutcome, EMPTY_QUESTION_ANSWER, NO_INFORMATION_ANSWER, QueryPipeline,
    QueryPipelineBuilder,
};
pub use prompt::{Passage, PromptBuilder};
pub use session::{Session, SessionBuilder};
pub use store::DocumentStore;
pub use vectorstore::{QueryInput, VectorIndex};
