//! Mock inference client for testing.

use super::{GenerateResponse, InferenceClient, ProviderError};
use crate::models::Content;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Mutex;

/// Arguments of one recorded `generate` call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub model: String,
    pub contents: Vec<Content>,
    pub config: Map<String, Value>,
}

enum Behaviour {
    Reply(String),
    Fail(String),
}

/// Mock inference client that replies with fixed text or fails.
pub struct MockInferenceClient {
    behaviour: Behaviour,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockInferenceClient {
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            behaviour: Behaviour::Reply(text.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with a network error carrying `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            behaviour: Behaviour::Fail(message.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or(0)
    }

    pub fn last_call(&self) -> Option<RecordedCall> {
        self.calls.lock().ok().and_then(|calls| calls.last().cloned())
    }
}

#[async_trait]
impl InferenceClient for MockInferenceClient {
    async fn generate(
        &self,
        model: &str,
        contents: &[Content],
        config: &Map<String, Value>,
    ) -> Result<GenerateResponse, ProviderError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                model: model.to_string(),
                contents: contents.to_vec(),
                config: config.clone(),
            });
        }

        match &self.behaviour {
            Behaviour::Reply(text) => Ok(GenerateResponse { text: text.clone() }),
            Behaviour::Fail(message) => Err(ProviderError::Network(message.clone())),
        }
    }
}
