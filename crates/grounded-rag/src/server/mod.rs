//! HTTP server for the RAG pipeline

pub mod routes;
pub mod state;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::RagConfig;
use crate::error::{Error, Result};
use state::AppState;

/// RAG HTTP Server
pub struct RagServer {
    config: RagConfig,
    state: AppState,
}

impl RagServer {
    /// Create a new RAG server, loading the persisted index if present
    pub async fn new(config: RagConfig) -> Result<Self> {
        let state = AppState::new(config.clone()).await?;
        Ok(Self { config, state })
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::invalid_config(format!("Invalid address: {}", e)))?;

        let router = self.build_router();

        tracing::info!("Starting RAG server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::invalid_config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Router over the given state
pub fn build_router(state: AppState) -> Router {
    let enable_cors = state.config().server.enable_cors;

    let router = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness))
        .nest("/api", routes::api_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new());

    if enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Readiness check endpoint: an index is loaded and both providers answer
async fn readiness(state: axum::extract::State<AppState>) -> axum::http::StatusCode {
    if !state.is_ready() {
        return axum::http::StatusCode::SERVICE_UNAVAILABLE;
    }

    let pipeline = state.pipeline();
    let (embedder, llm) = futures::join!(
        pipeline.embedder().health_check(),
        pipeline.llm().health_check()
    );
    match (embedder, llm) {
        (Ok(true), Ok(true)) => axum::http::StatusCode::OK,
        (embedder, llm) => {
            tracing::warn!(
                "Providers not ready: embedder {:?}, llm {:?}",
                embedder,
                llm
            );
            axum::http::StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
