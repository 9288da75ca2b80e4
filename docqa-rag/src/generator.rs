//! Answer generator trait for text-generation backends.

use async_trait::async_trait;

use crate::error::Result;

/// A text-generation backend that turns a prompt into an answer.
///
/// Calls are single-shot and block until the backend returns. `max_length`
/// is a hard cap on output length in the backend's own units (tokens for
/// most servers); the backend truncates rather than summarises.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::AnswerGenerator;
///
/// let answer = generator.generate(&prompt, 150).await?;
/// ```
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Generate text for `prompt`, producing at most `max_length` units.
    async fn generate(&self, prompt: &str, max_length: usize) -> Result<String>;
}
