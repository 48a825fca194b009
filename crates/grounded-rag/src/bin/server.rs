//! RAG Server binary
//!
//! Run with: cargo run -p grounded-rag --bin grounded-rag-server [config.toml]

use grounded_rag::{config::RagConfig, server::RagServer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "grounded_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = RagConfig::load(config_path.as_deref())?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Data directory: {}", config.documents.data_dir.display());
    tracing::info!("  - Index file: {}", config.index.storage_path.display());
    tracing::info!("  - Embedding model: {} ({} dims)", config.embeddings.model, config.embeddings.dimensions);
    tracing::info!("  - LLM model: {}", config.llm.generate_model);
    tracing::info!("  - Chunk size: {} (overlap {})", config.chunking.chunk_size, config.chunking.chunk_overlap);

    let server = RagServer::new(config).await?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("\nEndpoints:");
    println!("  POST /api/index/rebuild - Rebuild the index");
    println!("  POST /api/query         - Ask questions");
    println!("  GET  /api/index         - Index status");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
