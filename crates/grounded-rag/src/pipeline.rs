//! Question answering: retrieve, assemble the prompt, generate

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

use crate::config::RagConfig;
use crate::error::{Error, ProviderError, Result, Stage};
use crate::generation::PromptBuilder;
use crate::providers::{EmbeddingProvider, LlmProvider};
use crate::retrieval::{retrieve, VectorIndex};
use crate::types::Answer;

/// Where an answer request is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Retrieving,
    Assembling,
    Generating,
    Done,
    Failed(Stage),
}

impl PipelineState {
    fn can_move_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Idle, Retrieving)
                | (Retrieving, Assembling)
                | (Assembling, Generating)
                | (Generating, Done)
                | (Retrieving, Failed(Stage::Retrieving))
                | (Assembling, Failed(Stage::Assembling))
                | (Generating, Failed(Stage::Generating))
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => f.write_str("idle"),
            PipelineState::Retrieving => f.write_str("retrieving"),
            PipelineState::Assembling => f.write_str("assembling"),
            PipelineState::Generating => f.write_str("generating"),
            PipelineState::Done => f.write_str("done"),
            PipelineState::Failed(stage) => write!(f, "failed while {}", stage),
        }
    }
}

/// State history of a single answer request
#[derive(Debug, Clone)]
pub struct PipelineRun {
    history: Vec<PipelineState>,
}

impl PipelineRun {
    fn new() -> Self {
        Self {
            history: vec![PipelineState::Idle],
        }
    }

    pub fn state(&self) -> PipelineState {
        self.history
            .last()
            .copied()
            .unwrap_or(PipelineState::Idle)
    }

    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    fn advance(&mut self, next: PipelineState) {
        let current = self.state();
        debug_assert!(current.can_move_to(next), "illegal transition {} -> {}", current, next);
        tracing::debug!("pipeline: {} -> {}", current, next);
        self.history.push(next);
    }

    fn fail(&mut self, stage: Stage, err: Error) -> Error {
        self.advance(PipelineState::Failed(stage));
        tracing::warn!("Answer failed while {}: {}", stage, err);
        err.at_stage(stage)
    }
}

/// Answers questions against an index snapshot.
///
/// Holds no index itself, so one pipeline serves every snapshot the caller
/// hands it. Never returns a partial answer.
pub struct AnsweringPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmProvider>,
    prompt: PromptBuilder,
    max_tokens: u32,
    timeout: Duration,
}

impl AnsweringPipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
        prompt: PromptBuilder,
        max_tokens: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            llm,
            prompt,
            max_tokens,
            timeout,
        }
    }

    /// Create with prompt, token and deadline settings from configuration
    pub fn from_config(
        config: &RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        Self::new(
            embedder,
            llm,
            PromptBuilder::new(config.prompt.min_words),
            config.llm.max_tokens,
            Duration::from_secs(config.retrieval.answer_timeout_secs),
        )
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn llm(&self) -> &Arc<dyn LlmProvider> {
        &self.llm
    }

    /// Answer `question` from the `k` most relevant chunks of `index`
    pub async fn answer(&self, index: &VectorIndex, question: &str, k: usize) -> Result<Answer> {
        self.answer_traced(index, question, k).await.0
    }

    /// Like [`answer`](Self::answer), also returning the state history
    pub async fn answer_traced(
        &self,
        index: &VectorIndex,
        question: &str,
        k: usize,
    ) -> (Result<Answer>, PipelineRun) {
        let mut run = PipelineRun::new();
        let result = self.execute(&mut run, index, question, k).await;
        (result, run)
    }

    async fn execute(
        &self,
        run: &mut PipelineRun,
        index: &VectorIndex,
        question: &str,
        k: usize,
    ) -> Result<Answer> {
        // A timeout too large to represent means no deadline
        let deadline = Instant::now().checked_add(self.timeout);

        run.advance(PipelineState::Retrieving);
        let sources = match before(deadline, retrieve(index, self.embedder.as_ref(), question, k)).await {
            Some(Ok(sources)) => sources,
            Some(Err(e)) => return Err(run.fail(Stage::Retrieving, e)),
            None => {
                let e = Error::Embedding(ProviderError::timed_out("retrieval"));
                return Err(run.fail(Stage::Retrieving, e));
            }
        };

        run.advance(PipelineState::Assembling);
        let prompt = self.prompt.assemble(&sources, question);
        if sources.is_empty() {
            tracing::info!("No chunks retrieved; generating with empty context");
        }

        run.advance(PipelineState::Generating);
        let text = match before(deadline, self.llm.generate(&prompt, self.max_tokens)).await {
            Some(Ok(text)) => text,
            Some(Err(e)) => return Err(run.fail(Stage::Generating, e)),
            None => {
                let e = Error::Generation(ProviderError::timed_out("generation"));
                return Err(run.fail(Stage::Generating, e));
            }
        };

        run.advance(PipelineState::Done);
        tracing::info!(
            "Answered with {} sources using {}",
            sources.len(),
            self.llm.model()
        );

        Ok(Answer { text, sources })
    }
}

/// Run `future` to completion, or return `None` once `deadline` passes
async fn before<F: Future>(deadline: Option<Instant>, future: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => timeout_at(deadline, future).await.ok(),
        None => Some(future.await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_transitions() {
        use PipelineState::*;
        assert!(Idle.can_move_to(Retrieving));
        assert!(Generating.can_move_to(Done));
        assert!(Retrieving.can_move_to(Failed(Stage::Retrieving)));
        assert!(!Idle.can_move_to(Generating));
        assert!(!Done.can_move_to(Retrieving));
        assert!(!Retrieving.can_move_to(Failed(Stage::Generating)));
    }
}
