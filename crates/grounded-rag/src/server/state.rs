//! Application state for the RAG server

use parking_lot::RwLock;
use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::indexer::rebuild_index;
use crate::ingestion::{DirectoryLoader, DocumentSource};
use crate::pipeline::AnsweringPipeline;
use crate::providers::{self, EmbeddingProvider, LlmProvider};
use crate::retrieval::VectorIndex;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: RagConfig,
    /// Answering pipeline with its providers
    pipeline: AnsweringPipeline,
    /// Where rebuilds read documents from
    source: Arc<dyn DocumentSource>,
    /// Current index snapshot; replaced wholesale on rebuild
    index: RwLock<Option<Arc<VectorIndex>>>,
    /// Why the last load attempt failed
    load_error: RwLock<Option<String>>,
    /// Serializes rebuilds
    rebuild_lock: tokio::sync::Mutex<()>,
}

impl AppState {
    /// Create state from configuration and try to load the persisted index
    pub async fn new(config: RagConfig) -> Result<Self> {
        tracing::info!("Initializing RAG application state...");

        let (embedder, llm) = providers::from_config(&config)?;
        let source = Arc::new(DirectoryLoader::new(config.documents.data_dir.clone()));
        let state = Self::with_providers(config, embedder, llm, source);

        if let Err(e) = state.load_index() {
            tracing::warn!("{}", e.user_message());
        }

        Ok(state)
    }

    /// Create state from explicit providers without touching the index file
    pub fn with_providers(
        config: RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
        source: Arc<dyn DocumentSource>,
    ) -> Self {
        let pipeline = AnsweringPipeline::from_config(&config, embedder, llm);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pipeline,
                source,
                index: RwLock::new(None),
                load_error: RwLock::new(None),
                rebuild_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Load the persisted index, requiring the current embedder's dimension
    pub fn load_index(&self) -> Result<Arc<VectorIndex>> {
        let path = &self.inner.config.index.storage_path;
        let dimension = self.inner.pipeline.embedder().dimensions();

        match VectorIndex::load_expecting(path, dimension) {
            Ok(index) => {
                let index = Arc::new(index);
                self.publish(Arc::clone(&index));
                Ok(index)
            }
            Err(e) => {
                let reason = match &e {
                    Error::IndexLoad(reason) => reason.clone(),
                    other => other.to_string(),
                };
                *self.inner.load_error.write() = Some(reason);
                Err(e)
            }
        }
    }

    /// Rebuild from the document source, save, then swap the snapshot.
    ///
    /// Queries keep using the old snapshot until the swap.
    pub async fn rebuild(&self) -> Result<Arc<VectorIndex>> {
        let _guard = self.inner.rebuild_lock.lock().await;

        let index = rebuild_index(
            &self.inner.config,
            Arc::clone(&self.inner.source),
            self.inner.pipeline.embedder().as_ref(),
        )
        .await?;

        let index = Arc::new(index);
        self.publish(Arc::clone(&index));
        Ok(index)
    }

    fn publish(&self, index: Arc<VectorIndex>) {
        *self.inner.index.write() = Some(index);
        *self.inner.load_error.write() = None;
    }

    /// Current index snapshot, if any
    pub fn index(&self) -> Option<Arc<VectorIndex>> {
        self.inner.index.read().clone()
    }

    /// Current index snapshot or the reason there is none
    pub fn require_index(&self) -> Result<Arc<VectorIndex>> {
        if let Some(index) = self.index() {
            return Ok(index);
        }
        match self.inner.load_error.read().clone() {
            Some(reason) => Err(Error::IndexLoad(reason)),
            None => Err(Error::IndexUnavailable),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    /// Get the answering pipeline
    pub fn pipeline(&self) -> &AnsweringPipeline {
        &self.inner.pipeline
    }

    /// Ready once an index is loaded
    pub fn is_ready(&self) -> bool {
        self.inner.index.read().is_some()
    }
}
