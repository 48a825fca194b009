//! API routes for the RAG server

pub mod index;
pub mod query;

use axum::{
    routing::{get, post},
    Router,
};
use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Index management
        .route("/index", get(index::index_status))
        .route("/index/rebuild", post(index::rebuild_index))
        // Query
        .route("/query", post(query::query_rag))
        // Info
        .route("/info", get(info))
}

/// API info endpoint
async fn info() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "grounded-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Retrieval-augmented question answering over a document directory",
        "endpoints": {
            "GET /api/index": "Current index status",
            "POST /api/index/rebuild": "Rebuild the index from the data directory",
            "POST /api/query": "Ask a question grounded in the indexed documents"
        }
    }))
}
