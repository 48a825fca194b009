//! Query endpoint

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::ScoredChunk;

/// Question from a client
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    /// Overrides the configured number of retrieved chunks
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// A chunk the answer was grounded on
#[derive(Debug, Serialize)]
pub struct SourceView {
    pub source: String,
    pub page: Option<u32>,
    pub chunk_index: usize,
    pub score: f32,
    pub text: String,
}

impl From<&ScoredChunk> for SourceView {
    fn from(scored: &ScoredChunk) -> Self {
        Self {
            source: scored.chunk.source_path.clone(),
            page: scored.chunk.page,
            chunk_index: scored.chunk.chunk_index,
            score: scored.score,
            text: scored.chunk.text.clone(),
        }
    }
}

/// Answer returned to the client
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<SourceView>,
    pub processing_time_ms: u64,
}

/// POST /api/query - Answer a question from the current index snapshot
pub async fn query_rag(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    let start = Instant::now();

    if request.question.trim().is_empty() {
        return Err(Error::invalid_argument("question must not be empty"));
    }
    let top_k = request.top_k.unwrap_or(state.config().retrieval.top_k);

    tracing::info!("Query: \"{}\" (top_k {})", request.question, top_k);

    let index = state.require_index()?;
    let answer = state
        .pipeline()
        .answer(&index, &request.question, top_k)
        .await?;

    Ok(Json(QueryResponse {
        answer: answer.text,
        sources: answer.sources.iter().map(SourceView::from).collect(),
        processing_time_ms: start.elapsed().as_millis() as u64,
    }))
}
