//! Prompt template for grounded answers

use crate::types::RetrievalResult;

/// Separator placed between retrieved chunks in the context block
pub const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

/// Prompt builder for RAG queries
#[derive(Debug, Clone, Copy)]
pub struct PromptBuilder {
    /// Minimum answer length requested from the model
    min_words: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self { min_words: 250 }
    }
}

impl PromptBuilder {
    pub fn new(min_words: usize) -> Self {
        Self { min_words }
    }

    /// Join chunk texts verbatim, in retrieval order
    pub fn build_context(result: &RetrievalResult) -> String {
        result
            .iter()
            .map(|scored| scored.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_DELIMITER)
    }

    /// Build the full prompt. Pure: the same inputs always give the same text.
    pub fn assemble(&self, result: &RetrievalResult, question: &str) -> String {
        format!(
            r#"Human: Use the following pieces of context to provide a concise answer to the question at the end, but summarize with at least {min_words} words with detailed explanations.
Only use information from the context. If the context does not contain the answer, just say that you don't know; don't try to make up an answer.

<context>
{context}
</context>

Question: {question}

Assistant:"#,
            min_words = self.min_words,
            context = Self::build_context(result),
            question = question
        )
    }
}
