//! Ollama HTTP client for embeddings and generation with retry logic

use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

use crate::config::LlmConfig;
use crate::error::{Error, ProviderError, Result};

/// Ollama API client with automatic retry of transient failures
pub struct OllamaClient {
    /// HTTP client
    client: Client,
    /// Server base URL without trailing slash
    base_url: String,
    /// Optional bearer token
    api_key: Option<String>,
    /// Temperature for generation
    temperature: f32,
    /// Maximum retries
    max_retries: u32,
    /// Base delay for exponential backoff
    retry_base_delay: Duration,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaClient {
    /// Create a new Ollama client with retry support
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
            max_retries: config.max_retries,
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
        })
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let request = self.client.post(format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Retry an operation with exponential backoff while it fails transiently
    async fn retry_request<F, Fut, T>(&self, operation: F) -> std::result::Result<T, ProviderError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = std::result::Result<T, ProviderError>>,
    {
        retry_with_backoff(self.max_retries, self.retry_base_delay, operation).await
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Embed a batch of texts with one request, preserving input order
    pub async fn embed_batch(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self
            .retry_request(|| async move {
                let response = self
                    .post("/api/embed")
                    .json(&EmbedRequest { model, input: texts })
                    .send()
                    .await
                    .map_err(|e| ProviderError::from_reqwest(&e))?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(ProviderError::from_status(status, &body));
                }

                let parsed: EmbedResponse = response.json().await.map_err(|e| {
                    ProviderError::permanent(format!("Failed to parse embedding response: {}", e))
                })?;

                Ok(parsed.embeddings)
            })
            .await
            .map_err(Error::Embedding)?;

        if embeddings.len() != texts.len() {
            return Err(Error::embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        Ok(embeddings)
    }

    /// Complete a prompt without streaming
    pub async fn generate(&self, model: &str, prompt: &str, max_tokens: u32) -> Result<String> {
        tracing::info!("Generating answer with model: {}", model);
        let temperature = self.temperature;

        self.retry_request(|| async move {
            let request = GenerateRequest {
                model,
                prompt,
                stream: false,
                options: GenerateOptions {
                    temperature,
                    num_predict: max_tokens,
                },
            };

            let response = self
                .post("/api/generate")
                .json(&request)
                .send()
                .await
                .map_err(|e| ProviderError::from_reqwest(&e))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(ProviderError::from_status(status, &body));
            }

            let parsed: GenerateResponse = response.json().await.map_err(|e| {
                ProviderError::permanent(format!("Failed to parse generation response: {}", e))
            })?;

            Ok(parsed.response)
        })
        .await
        .map_err(Error::Generation)
    }
}

/// Run `operation` up to `max_retries + 1` times, sleeping `base * 2^attempt`
/// between attempts. Permanent failures return immediately.
pub async fn retry_with_backoff<F, Fut, T>(
    max_retries: u32,
    base_delay: Duration,
    operation: F,
) -> std::result::Result<T, ProviderError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, ProviderError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.transient && attempt < max_retries => {
                let delay = base_delay.saturating_mul(2u32.saturating_pow(attempt));
                tracing::warn!(
                    "Request failed (attempt {}/{}): {}, retrying in {:?}",
                    attempt + 1,
                    max_retries + 1,
                    e,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(2, Duration::from_millis(1), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ProviderError::transient("503"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let calls = AtomicU32::new(0);
        let result: std::result::Result<(), _> =
            retry_with_backoff(1, Duration::from_millis(1), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::transient("timeout")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: std::result::Result<(), _> =
            retry_with_backoff(3, Duration::from_millis(1), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::permanent("HTTP 404")) }
            })
            .await;

        assert_eq!(result.unwrap_err().message, "HTTP 404");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_embedding_error() {
        let config = LlmConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
            max_retries: 0,
            ..LlmConfig::default()
        };
        let client = OllamaClient::new(&config).unwrap();

        let err = client
            .embed_batch("nomic-embed-text", &["hello".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Embedding(ref e) if e.transient));
        assert!(!client.health_check().await.unwrap());
    }
}
