//! Inference client abstractions and implementations.
//!
//! The relay depends only on [`InferenceClient`], so the Vertex AI backend can
//! be swapped for the mock in tests.

pub mod mock;
pub mod vertex;

use crate::models::Content;
use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub use mock::MockInferenceClient;
pub use vertex::{VertexClient, VertexConfig};

/// Error type for inference calls.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Failed to obtain access token: {0}")]
    Auth(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Upstream returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    InvalidResponse(String),

    #[error("Response contained no text: {0}")]
    EmptyResponse(String),
}

/// Result of a generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateResponse {
    /// Concatenated text of the first candidate.
    pub text: String,
}

/// Upstream text-generation collaborator.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Run one `generateContent` call. Single attempt, no retry.
    async fn generate(
        &self,
        model: &str,
        contents: &[Content],
        config: &Map<String, Value>,
    ) -> Result<GenerateResponse, ProviderError>;
}
