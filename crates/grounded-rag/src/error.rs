//! Error types for the RAG pipeline

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Result type alias for RAG operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by an embedding or generation provider.
///
/// `message` is kept verbatim from the provider. `transient` failures
/// (connection errors, timeouts, HTTP 429 and 5xx) may be retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub message: String,
    pub transient: bool,
}

impl ProviderError {
    /// A failure worth retrying
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: true,
        }
    }

    /// A failure that will not go away on retry
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: false,
        }
    }

    /// Classify a reqwest transport error
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let transient = err.is_timeout()
            || err.is_connect()
            || err
                .status()
                .map(|s| s.as_u16() == 429 || s.is_server_error())
                .unwrap_or(false);
        Self {
            message: err.to_string(),
            transient,
        }
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let transient = status.as_u16() == 429 || status.is_server_error();
        Self {
            message: format!("HTTP {} - {}", status, body),
            transient,
        }
    }

    /// The provider did not answer before the deadline
    pub fn timed_out(what: &str) -> Self {
        Self::transient(format!("{} timed out", what))
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Pipeline stage in which an answer request failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Retrieving,
    Assembling,
    Generating,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Retrieving => "retrieving",
            Stage::Assembling => "assembling",
            Stage::Generating => "generating",
        };
        f.write_str(name)
    }
}

/// RAG pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Embedding provider failure
    #[error("Embedding failed: {0}")]
    Embedding(ProviderError),

    /// Generation provider failure
    #[error("Generation failed: {0}")]
    Generation(ProviderError),

    /// Vector of the wrong dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Persisted index is missing, corrupt or incompatible
    #[error("Index load failed: {0}")]
    IndexLoad(String),

    /// Invalid request argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No index has been built or loaded yet
    #[error("No index available")]
    IndexUnavailable,

    /// An answer request failed at a given stage
    #[error("Pipeline failed while {stage}: {source}")]
    Pipeline {
        stage: Stage,
        #[source]
        source: Box<Error>,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create a permanent embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(ProviderError::permanent(message))
    }

    /// Create a permanent generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(ProviderError::permanent(message))
    }

    /// Create an index load error
    pub fn index_load(message: impl Into<String>) -> Self {
        Self::IndexLoad(message.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Wrap an error with the pipeline stage it occurred in
    pub fn at_stage(self, stage: Stage) -> Self {
        match self {
            already @ Error::Pipeline { .. } => already,
            other => Error::Pipeline {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The underlying error, looking through pipeline wrapping
    pub fn root(&self) -> &Error {
        match self {
            Error::Pipeline { source, .. } => source.root(),
            other => other,
        }
    }

    /// Stage of a pipeline failure, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Pipeline { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Whether the underlying failure is a timeout against the answer deadline
    /// or a provider-reported timeout
    fn is_timeout(&self) -> bool {
        match self.root() {
            Error::Embedding(e) | Error::Generation(e) => e.message.contains("timed out"),
            _ => false,
        }
    }

    /// Message shown to end users
    pub fn user_message(&self) -> String {
        match self.root() {
            Error::Embedding(e) => format!("retrieval failed: {}", e),
            Error::Generation(e) => format!("generation failed: {}", e),
            Error::IndexLoad(reason) => {
                format!("index unavailable — rebuild required: {}", reason)
            }
            mismatch @ Error::DimensionMismatch { .. } => {
                format!("index unavailable — rebuild required: {}", mismatch)
            }
            Error::IndexUnavailable => {
                "index unavailable — rebuild required: no index has been built".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let message = self.user_message();
        let timeout = self.is_timeout();
        let (status, error_type) = match self.root() {
            Error::InvalidConfig(_) => (StatusCode::BAD_REQUEST, "config_error"),
            Error::InvalidArgument(_) => (StatusCode::BAD_REQUEST, "invalid_argument"),
            Error::Json(_) => (StatusCode::BAD_REQUEST, "json_error"),
            Error::Embedding(_) if timeout => (StatusCode::GATEWAY_TIMEOUT, "embedding_timeout"),
            Error::Embedding(_) => (StatusCode::BAD_GATEWAY, "embedding_error"),
            Error::Generation(_) if timeout => (StatusCode::GATEWAY_TIMEOUT, "generation_timeout"),
            Error::Generation(_) => (StatusCode::BAD_GATEWAY, "generation_error"),
            Error::DimensionMismatch { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "dimension_mismatch")
            }
            Error::IndexLoad(_) | Error::IndexUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "index_unavailable")
            }
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            Error::Internal(_) | Error::Pipeline { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_wrapping_keeps_first_stage() {
        let err = Error::embedding("boom")
            .at_stage(Stage::Retrieving)
            .at_stage(Stage::Generating);

        assert_eq!(err.stage(), Some(Stage::Retrieving));
        assert!(matches!(err.root(), Error::Embedding(_)));
    }

    #[test]
    fn test_user_messages() {
        let retrieval = Error::embedding("connection refused").at_stage(Stage::Retrieving);
        assert!(retrieval.user_message().starts_with("retrieval failed"));

        let generation = Error::generation("model not found");
        assert!(generation.user_message().starts_with("generation failed"));

        let load = Error::index_load("bad magic");
        assert!(load.user_message().starts_with("index unavailable"));
    }

    #[test]
    fn test_status_classification() {
        let e = ProviderError::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(e.transient);
        let e = ProviderError::from_status(reqwest::StatusCode::BAD_GATEWAY, "");
        assert!(e.transient);
        let e = ProviderError::from_status(reqwest::StatusCode::NOT_FOUND, "no such model");
        assert!(!e.transient);
    }

    #[test]
    fn test_timeout_maps_to_gateway_timeout() {
        let err = Error::Generation(ProviderError::timed_out("generation"))
            .at_stage(Stage::Generating);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
