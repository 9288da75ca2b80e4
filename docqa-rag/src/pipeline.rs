//! Question-answering pipeline.
//!
//! The [`QueryPipeline`] answers a question by querying the
//! [`KnowledgeBase`], gating on nearest-neighbour distance, building a
//! grounded prompt and calling an [`AnswerGenerator`]. Answered questions are
//! recorded in the [`SearchHistory`].
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::QueryPipeline;
//!
//! let pipeline = QueryPipeline::builder()
//!     .knowledge_base(kb.clone())
//!     .generator(Arc::new(my_generator))
//!     .build()?;
//!
//! let answer = pipeline.answer("What is kajmak?").await?;
//! println!("{} (sources: {:?})", answer.text, answer.source_ids);
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{GenerationFailure, QueryError, RagError, Result};
use crate::gate::RelevanceGate;
use crate::generator::AnswerGenerator;
use crate::history::{SearchHistory, SearchHistoryEntry};
use crate::knowledge::KnowledgeBase;
use crate::prompt::{PromptBuilder, label_passages};

/// Returned when no stored document is close enough to the question.
pub const NO_INFORMATION_ANSWER: &str =
    "I don't have information about that topic in my documents.";

/// Returned for an empty or whitespace-only question.
pub const EMPTY_QUESTION_ANSWER: &str = "Please enter a question!";

/// How an [`Answer`] was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    /// The generator answered from retrieved context.
    Answered,
    /// The relevance gate rejected the retrieved context.
    NoInformation,
    /// The question was empty.
    EmptyQuestion,
}

/// The pipeline's reply to a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    /// Answer text, trimmed.
    pub text: String,
    /// Ids of the documents used as context, best match first.
    pub source_ids: Vec<String>,
    /// How the answer was produced.
    pub outcome: AnswerOutcome,
}

impl Answer {
    fn fixed(text: &str, outcome: AnswerOutcome) -> Self {
        Self { text: text.to_string(), source_ids: Vec::new(), outcome }
    }

    /// True when the generator produced this answer.
    pub fn is_answered(&self) -> bool {
        self.outcome == AnswerOutcome::Answered
    }
}

/// Trim a question, rejecting it if nothing is left.
///
/// # Errors
///
/// Returns [`QueryError::EmptyQuestion`] for empty or whitespace-only input.
pub fn validate_question(question: &str) -> std::result::Result<&str, QueryError> {
    let trimmed = question.trim();
    if trimmed.is_empty() { Err(QueryError::EmptyQuestion) } else { Ok(trimmed) }
}

/// The question-answering orchestrator.
///
/// Retrieval depth, relevance threshold and answer length come from the
/// knowledge base's [`RagConfig`](crate::config::RagConfig). Construct one via
/// [`QueryPipeline::builder()`].
pub struct QueryPipeline {
    knowledge_base: Arc<KnowledgeBase>,
    generator: Arc<dyn AnswerGenerator>,
    history: Arc<SearchHistory>,
    prompt_builder: PromptBuilder,
    gate: RelevanceGate,
}

impl QueryPipeline {
    /// Create a new [`QueryPipelineBuilder`].
    pub fn builder() -> QueryPipelineBuilder {
        QueryPipelineBuilder::default()
    }

    /// The knowledge base answers are drawn from.
    pub fn knowledge_base(&self) -> &Arc<KnowledgeBase> {
        &self.knowledge_base
    }

    /// The history answered questions are recorded in.
    pub fn history(&self) -> &Arc<SearchHistory> {
        &self.history
    }

    /// The relevance gate in use.
    pub fn gate(&self) -> RelevanceGate {
        self.gate
    }

    /// Answer a question: search → gate → prompt → generate → record.
    ///
    /// Empty questions and irrelevant context yield fixed answers without
    /// calling the generator; neither is recorded in the history.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationFailure`] if the embedding provider, the vector
    /// index or the generator fails. Nothing is recorded in that case.
    pub async fn answer(&self, question: &str) -> std::result::Result<Answer, GenerationFailure> {
        let Ok(question) = validate_question(question) else {
            return Ok(Answer::fixed(EMPTY_QUESTION_ANSWER, AnswerOutcome::EmptyQuestion));
        };
        let config = self.knowledge_base.config();

        // 1. Retrieve the nearest documents
        let results = self.knowledge_base.search(question, config.top_k).await.map_err(|e| {
            error!(error = %e, "retrieval failed");
            GenerationFailure::from(e)
        })?;

        // 2. Gate on the best distance
        if !self.gate.passes(results.distances()) {
            info!(
                result_count = results.len(),
                best_distance = ?results.distances().first(),
                threshold = self.gate.threshold(),
                "no relevant context"
            );
            return Ok(Answer::fixed(NO_INFORMATION_ANSWER, AnswerOutcome::NoInformation));
        }

        // 3. Build the prompt from the labelled passages
        let passages = label_passages(results.texts().iter().map(String::as_str));
        let prompt = self.prompt_builder.build(question, &passages);

        // 4. Generate and trim
        let generated = self.generate(&prompt, config.max_answer_length).await?;
        let text = generated.trim().to_string();
        let source_ids = results.ids().to_vec();

        // 5. Record
        let source_id = source_ids.first().cloned().unwrap_or_default();
        self.history.record(SearchHistoryEntry::new(question, text.clone(), source_id)).await;

        info!(source_count = source_ids.len(), answer_len = text.len(), "answered question");
        Ok(Answer { text, source_ids, outcome: AnswerOutcome::Answered })
    }

    async fn generate(&self, prompt: &str, max_length: usize) -> Result<String> {
        self.generator.generate(prompt, max_length).await.map_err(|e| {
            error!(error = %e, "answer generation failed");
            e
        })
    }
}

/// Builder for constructing a [`QueryPipeline`].
///
/// `knowledge_base` and `generator` are required. The history defaults to a
/// fresh [`SearchHistory`] and the gate to the configured threshold.
#[derive(Default)]
pub struct QueryPipelineBuilder {
    knowledge_base: Option<Arc<KnowledgeBase>>,
    generator: Option<Arc<dyn AnswerGenerator>>,
    history: Option<Arc<SearchHistory>>,
    prompt_builder: Option<PromptBuilder>,
}

impl QueryPipelineBuilder {
    /// Set the knowledge base.
    pub fn knowledge_base(mut self, knowledge_base: Arc<KnowledgeBase>) -> Self {
        self.knowledge_base = Some(knowledge_base);
        self
    }

    /// Set the answer generator.
    pub fn generator(mut self, generator: Arc<dyn AnswerGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Share an existing history.
    pub fn history(mut self, history: Arc<SearchHistory>) -> Self {
        self.history = Some(history);
        self
    }

    /// Set the prompt builder.
    pub fn prompt_builder(mut self, prompt_builder: PromptBuilder) -> Self {
        self.prompt_builder = Some(prompt_builder);
        self
    }

    /// Build the [`QueryPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if any required field is missing.
    pub fn build(self) -> Result<QueryPipeline> {
        let knowledge_base = self
            .knowledge_base
            .ok_or_else(|| RagError::ConfigError("knowledge_base is required".to_string()))?;
        let generator = self
            .generator
            .ok_or_else(|| RagError::ConfigError("generator is required".to_string()))?;
        let gate = RelevanceGate::new(knowledge_base.config().relevance_threshold);

        Ok(QueryPipeline {
            knowledge_base,
            generator,
            history: self.history.unwrap_or_default(),
            prompt_builder: self.prompt_builder.unwrap_or_default(),
            gate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_questions_are_empty() {
        assert_eq!(validate_question(""), Err(QueryError::EmptyQuestion));
        assert_eq!(validate_question(" \n\t "), Err(QueryError::EmptyQuestion));
        assert_eq!(validate_question("  What is kajmak? "), Ok("What is kajmak?"));
    }
}
