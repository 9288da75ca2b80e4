//! Prompt assembly from a question and retrieved passages.

/// Answer the generator is told to give when the context is insufficient.
pub const UNKNOWN_ANSWER: &str = "I don't know.";

/// A retrieved passage with its 1-based position in the ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Passage<'a> {
    /// Label number, `1` for the best match.
    pub index: usize,
    /// Passage text.
    pub text: &'a str,
}

/// Builds grounded prompts of the form
///
/// ```text
/// Context information:
/// Document 1: ...
///
/// Document 2: ...
///
/// Question: ...
///
/// Instructions: Answer ONLY using the information provided above. ...
///
/// Answer:
/// ```
///
/// Passages are emitted in the order given. The builder does not cap the
/// number or size of passages; callers bound that through `top_k`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    /// Create a prompt builder.
    pub fn new() -> Self {
        Self
    }

    /// Assemble the prompt.
    pub fn build(&self, question: &str, passages: &[Passage<'_>]) -> String {
        let context = passages
            .iter()
            .map(|p| format!("Document {}: {}", p.index, p.text))
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            "Context information:\n{context}\n\nQuestion: {question}\n\n\
             Instructions: Answer ONLY using the information provided above. \
             If the answer is not in the context, respond with \"{UNKNOWN_ANSWER}\" \
             Do not add information from outside the context.\n\nAnswer:"
        )
    }
}

/// Number passages `1..=n` in the order given.
pub fn label_passages<'a, I>(texts: I) -> Vec<Passage<'a>>
where
    I: IntoIterator<Item = &'a str>,
{
    texts.into_iter().enumerate().map(|(i, text)| Passage { index: i + 1, text }).collect()
}
