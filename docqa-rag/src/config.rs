//! Configuration for the question-answering pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Default relevance threshold, calibrated for squared L2 distance over
/// unit-normalised embeddings.
pub const DEFAULT_RELEVANCE_THRESHOLD: f32 = 1.5;

/// Default maximum upload size: 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Configuration parameters for ingestion and querying.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Name of the vector index collection holding the documents.
    pub collection: String,
    /// Number of nearest neighbours fed into the prompt.
    pub top_k: usize,
    /// Maximum nearest-neighbour distance for context to count as relevant.
    pub relevance_threshold: f32,
    /// Hard cap on generated answer length, passed to the generator.
    pub max_answer_length: usize,
    /// Uploads larger than this are rejected.
    pub max_upload_bytes: usize,
    /// Converted text shorter than this (after trimming) is treated as a
    /// failed conversion.
    pub min_text_chars: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            collection: "docs".to_string(),
            top_k: 3,
            relevance_threshold: DEFAULT_RELEVANCE_THRESHOLD,
            max_answer_length: 150,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            min_text_chars: 10,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check that the parameters are usable.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `collection` is empty
    /// - `top_k == 0`
    /// - `relevance_threshold` is negative or not finite
    /// - `max_answer_length == 0`
    /// - `max_upload_bytes == 0`
    pub fn validate(&self) -> Result<()> {
        if self.collection.trim().is_empty() {
            return Err(RagError::ConfigError("collection must not be empty".to_string()));
        }
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if !self.relevance_threshold.is_finite() || self.relevance_threshold < 0.0 {
            return Err(RagError::ConfigError(format!(
                "relevance_threshold ({}) must be a finite, non-negative number",
                self.relevance_threshold
            )));
        }
        if self.max_answer_length == 0 {
            return Err(RagError::ConfigError(
                "max_answer_length must be greater than zero".to_string(),
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(RagError::ConfigError(
                "max_upload_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the vector index collection name.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.config.collection = name.into();
        self
    }

    /// Set the number of nearest neighbours used as context.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the maximum distance for retrieved context to be used.
    pub fn relevance_threshold(mut self, threshold: f32) -> Self {
        self.config.relevance_threshold = threshold;
        self
    }

    /// Set the generator output cap.
    pub fn max_answer_length(mut self, length: usize) -> Self {
        self.config.max_answer_length = length;
        self
    }

    /// Set the upload size limit in bytes.
    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    /// Set the minimum converted text length in characters.
    pub fn min_text_chars(mut self, chars: usize) -> Self {
        self.config.min_text_chars = chars;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
