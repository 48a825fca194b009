//! Command-line interface: build the index, ask questions, serve HTTP
//!
//! Run with: cargo run -p grounded-rag --features cli --bin grounded-rag -- <command>

use anyhow::Context;
use clap::{Parser, Subcommand};
use grounded_rag::{
    config::RagConfig,
    indexer::rebuild_index,
    ingestion::DirectoryLoader,
    pipeline::AnsweringPipeline,
    providers,
    retrieval::{IndexHeader, VectorIndex},
    server::RagServer,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "grounded-rag", version, about = "Ask questions about a directory of documents")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild the index from the data directory
    Build,
    /// Answer a question from the current index
    Ask {
        question: String,
        /// Number of chunks to retrieve
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
    /// Start the HTTP server
    Serve,
    /// Show the header of the index file
    Inspect,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "grounded_rag=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = RagConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Command::Build => {
            let (embedder, _) = providers::from_config(&config)?;
            let source = Arc::new(DirectoryLoader::new(config.documents.data_dir.clone()));
            let index = rebuild_index(&config, source, embedder.as_ref()).await?;
            println!(
                "Indexed {} chunks from {} documents into {}",
                index.len(),
                index.document_count(),
                config.index.storage_path.display()
            );
        }
        Command::Ask { question, top_k } => {
            let (embedder, llm) = providers::from_config(&config)?;
            let index = VectorIndex::load_expecting(&config.index.storage_path, embedder.dimensions())
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            let pipeline = AnsweringPipeline::from_config(&config, embedder, llm);

            let answer = pipeline
                .answer(&index, &question, top_k.unwrap_or(config.retrieval.top_k))
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;

            println!("{}\n", answer.text);
            println!("Sources:");
            for (i, source) in answer.sources.iter().enumerate() {
                println!("  [{}] {} (score {:.3})", i + 1, source.chunk.source_ref(), source.score);
            }
        }
        Command::Serve => {
            RagServer::new(config).await?.start().await?;
        }
        Command::Inspect => {
            let path = &config.index.storage_path;
            let header = IndexHeader::read(path).map_err(|e| anyhow::anyhow!(e.user_message()))?;
            println!("Index:     {}", path.display());
            println!("Version:   {}", header.version);
            println!("Metric:    {}", header.metric);
            println!("Dimension: {}", header.dimension);
            println!("Entries:   {}", header.entry_count);
            println!("Payload:   {} bytes", header.payload_len);
            println!("SHA-256:   {}", header.checksum_hex());
        }
    }

    Ok(())
}
