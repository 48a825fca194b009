//! HTTP routes exercised through the router without a network listener

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use grounded_rag::config::RagConfig;
use grounded_rag::error::Result;
use grounded_rag::ingestion::DirectoryLoader;
use grounded_rag::providers::{HashingEmbedder, LlmProvider};
use grounded_rag::server::{build_router, state::AppState};

struct EchoLlm;

#[async_trait]
impl LlmProvider for EchoLlm {
    async fn generate(&self, prompt: &str, _max_tokens: u32) -> Result<String> {
        Ok(format!("answered from {} prompt bytes", prompt.len()))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "echo"
    }

    fn model(&self) -> &str {
        "echo"
    }
}

/// Generates, but reports itself unhealthy
struct UnhealthyLlm;

#[async_trait]
impl LlmProvider for UnhealthyLlm {
    async fn generate(&self, _prompt: &str, _max_tokens: u32) -> Result<String> {
        Ok(String::new())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(false)
    }

    fn name(&self) -> &str {
        "unhealthy"
    }

    fn model(&self) -> &str {
        "unhealthy"
    }
}

fn app(dir: &tempfile::TempDir) -> (AppState, Router) {
    app_with_llm(dir, Arc::new(EchoLlm))
}

fn app_with_llm(dir: &tempfile::TempDir, llm: Arc<dyn LlmProvider>) -> (AppState, Router) {
    let data_dir = dir.path().join("data");
    std::fs::create_dir_all(&data_dir).unwrap();
    std::fs::write(data_dir.join("sky.txt"), "The sky is blue on a clear day.").unwrap();
    std::fs::write(data_dir.join("water.md"), "Water is wet and boils at 100 degrees.").unwrap();

    let mut config = RagConfig::default();
    config.documents.data_dir = data_dir.clone();
    config.index.storage_path = dir.path().join("index").join("index.grix");
    config.embeddings.dimensions = 64;
    config.chunking.chunk_size = 200;
    config.chunking.chunk_overlap = 50;

    let state = AppState::with_providers(
        config,
        Arc::new(HashingEmbedder::new(64)),
        llm,
        Arc::new(DirectoryLoader::new(data_dir)),
    );
    (state.clone(), build_router(state))
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(v) => Body::from(v.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn query_before_rebuild_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let (_, router) = app(&dir);

    let (status, _) = send(&router, "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, body) = send(&router, "POST", "/api/query", Some(json!({"question": "Why?"}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["type"], "index_unavailable");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("index unavailable"));
}

#[tokio::test]
async fn rebuild_then_query() {
    let dir = tempfile::tempdir().unwrap();
    let (state, router) = app(&dir);

    let (status, body) = send(&router, "POST", "/api/index/rebuild", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["loaded"], true);
    assert_eq!(body["entries"], 2);
    assert_eq!(body["documents"], 2);
    assert_eq!(body["metric"], "cosine");
    assert!(state.config().index.storage_path.exists());

    let (status, _) = send(&router, "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &router,
        "POST",
        "/api/query",
        Some(json!({"question": "Is water wet?", "top_k": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["answer"].as_str().unwrap().starts_with("answered from"));
    let sources = body["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0]["source"], "water.md");
}

#[tokio::test]
async fn persisted_index_is_reloaded() {
    let dir = tempfile::tempdir().unwrap();
    let (state, _) = app(&dir);
    state.rebuild().await.unwrap();

    let (fresh, router) = app(&dir);
    assert!(!fresh.is_ready());
    fresh.load_index().unwrap();

    let (status, body) = send(&router, "GET", "/api/index", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"], 2);
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (state, router) = app(&dir);
    state.rebuild().await.unwrap();

    let (status, body) = send(&router, "POST", "/api/query", Some(json!({"question": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "invalid_argument");

    let (status, _) = send(
        &router,
        "POST",
        "/api/query",
        Some(json!({"question": "Why?", "top_k": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn corrupt_index_reports_rebuild_required() {
    let dir = tempfile::tempdir().unwrap();
    let (state, router) = app(&dir);
    let path = state.config().index.storage_path.clone();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"definitely not an index").unwrap();

    assert!(state.load_index().is_err());

    let (status, body) = send(&router, "POST", "/api/query", Some(json!({"question": "Why?"}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("rebuild required"));
}

#[tokio::test]
async fn unhealthy_provider_is_not_ready() {
    let dir = tempfile::tempdir().unwrap();
    let (state, router) = app_with_llm(&dir, Arc::new(UnhealthyLlm));
    state.rebuild().await.unwrap();
    assert!(state.is_ready());

    let (status, _) = send(&router, "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = send(&router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}
