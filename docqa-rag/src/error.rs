//! Error types for the `docqa-rag` crate.

use thiserror::Error;

/// Errors raised by the collaborators of the question-answering core:
/// embedding providers, vector indexes and answer generators.
#[derive(Debug, Error)]
pub enum RagError {
    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector index backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred while generating an answer.
    #[error("Generator error ({generator}): {message}")]
    GeneratorError {
        /// The answer generator that produced the error.
        generator: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Local I/O failed (temporary files, index snapshots).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An index snapshot could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A convenience result type for collaborator operations.
pub type Result<T> = std::result::Result<T, RagError>;

/// Errors returned by a [`Converter`](crate::convert::Converter).
///
/// Unsupported formats and unreadable input are kept apart so callers can
/// tell "wrong kind of file" from "broken file".
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The converter does not handle this extension.
    #[error("Unsupported extension: {0}")]
    Unsupported(String),

    /// The file could not be read or decoded.
    #[error("Unreadable document {path}: {message}")]
    Unreadable {
        /// Path of the staged file.
        path: String,
        /// A description of the failure.
        message: String,
    },
}

/// Per-file ingestion failures.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The upload exceeds the configured size limit.
    #[error("{filename}: File too large ({size} bytes, max {limit} bytes)")]
    TooLarge {
        /// Name of the uploaded file.
        filename: String,
        /// Size of the upload in bytes.
        size: usize,
        /// Configured limit in bytes.
        limit: usize,
    },

    /// The extension is not on the allow-list.
    #[error("{filename}: Unsupported file type '{extension}'")]
    UnsupportedType {
        /// Name of the uploaded file.
        filename: String,
        /// The rejected extension (lowercase, without the dot).
        extension: String,
    },

    /// Conversion produced (almost) no text.
    #[error("{filename}: File appears to be empty or corrupted")]
    EmptyOrCorrupt {
        /// Name of the uploaded file.
        filename: String,
    },

    /// The conversion backend failed.
    #[error("{filename}: {source}")]
    ConversionFailed {
        /// Name of the uploaded file.
        filename: String,
        /// The converter error.
        #[source]
        source: ConversionError,
    },

    /// Embedding or index insertion failed; nothing was stored.
    #[error("{filename}: indexing failed: {source}")]
    Indexing {
        /// Name of the uploaded file.
        filename: String,
        /// The collaborator error.
        #[source]
        source: RagError,
    },
}

impl IngestError {
    /// Name of the file this error belongs to.
    pub fn filename(&self) -> &str {
        match self {
            Self::TooLarge { filename, .. }
            | Self::UnsupportedType { filename, .. }
            | Self::EmptyOrCorrupt { filename }
            | Self::ConversionFailed { filename, .. }
            | Self::Indexing { filename, .. } => filename,
        }
    }
}

/// Per-file failures of a markdown export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The extension is not on the allow-list.
    #[error("{filename}: Unsupported file type '{extension}'")]
    UnsupportedType {
        /// Name of the input file.
        filename: String,
        /// The rejected extension (lowercase, without the dot).
        extension: String,
    },

    /// The conversion backend failed.
    #[error("{filename}: {source}")]
    Conversion {
        /// Name of the input file.
        filename: String,
        /// The converter error.
        #[source]
        source: ConversionError,
    },

    /// The markdown file could not be written.
    #[error("{filename}: failed to write markdown: {source}")]
    Write {
        /// Name of the input file.
        filename: String,
        /// The I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// A query failed inside the embedding provider, the vector index or the
/// answer generator. Session state is left unchanged.
#[derive(Debug, Error)]
#[error("Answer generation failed: {cause}")]
pub struct GenerationFailure {
    /// The underlying collaborator error.
    #[source]
    pub cause: RagError,
}

impl From<RagError> for GenerationFailure {
    fn from(cause: RagError) -> Self {
        Self { cause }
    }
}

/// Question validation errors.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum QueryError {
    /// The question is empty or whitespace only.
    #[error("question must not be empty")]
    EmptyQuestion,
}
