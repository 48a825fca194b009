//! Index status and rebuild endpoints

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;

use crate::error::Result;
use crate::retrieval::VectorIndex;
use crate::server::state::AppState;

/// Index summary returned by the index endpoints
#[derive(Debug, Serialize)]
pub struct IndexStatus {
    pub loaded: bool,
    pub path: String,
    pub entries: usize,
    pub documents: usize,
    pub dimension: Option<usize>,
    pub metric: Option<String>,
    pub embedder: Option<String>,
    pub built_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rebuild_ms: Option<u64>,
}

impl IndexStatus {
    fn new(state: &AppState, index: Option<&VectorIndex>) -> Self {
        let path = state.config().index.storage_path.display().to_string();
        match index {
            Some(index) => Self {
                loaded: true,
                path,
                entries: index.len(),
                documents: index.document_count(),
                dimension: Some(index.dimension()),
                metric: Some(index.metric().to_string()),
                embedder: Some(index.embedder().to_string()),
                built_at: Some(index.built_at()),
                rebuild_ms: None,
            },
            None => Self {
                loaded: false,
                path,
                entries: 0,
                documents: 0,
                dimension: None,
                metric: None,
                embedder: None,
                built_at: None,
                rebuild_ms: None,
            },
        }
    }
}

/// GET /api/index - Current index snapshot
pub async fn index_status(State(state): State<AppState>) -> Json<IndexStatus> {
    let index = state.index();
    Json(IndexStatus::new(&state, index.as_deref()))
}

/// POST /api/index/rebuild - Rebuild from the data directory and swap it in
pub async fn rebuild_index(State(state): State<AppState>) -> Result<Json<IndexStatus>> {
    let start = Instant::now();
    tracing::info!("Index rebuild requested");

    let index = state.rebuild().await?;

    let mut status = IndexStatus::new(&state, Some(index.as_ref()));
    status.rebuild_ms = Some(start.elapsed().as_millis() as u64);
    Ok(Json(status))
}
