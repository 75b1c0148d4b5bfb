//! Vertex AI inference client.
//!
//! Calls the regional `generateContent` endpoint of a Google publisher model
//! with a bearer token from the ambient service identity.

use super::{GenerateResponse, InferenceClient, ProviderError};
use crate::models::Content;
use crate::services::credentials::AccessTokenSource;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Generation-config keys that Vertex expects at the top level of the request.
const TOP_LEVEL_KEYS: &[&str] = &[
    "systemInstruction",
    "safetySettings",
    "tools",
    "toolConfig",
    "cachedContent",
    "labels",
];

/// Upstream error bodies are truncated to this many characters.
const ERROR_BODY_PREVIEW_CHARS: usize = 500;

/// Vertex AI client configuration.
#[derive(Debug, Clone)]
pub struct VertexConfig {
    pub project_id: String,
    pub location: String,
    /// Scheme and host, e.g. `https://us-central1-aiplatform.googleapis.com`.
    pub api_base: String,
}

/// Vertex AI inference client. Built once at startup and shared.
pub struct VertexClient {
    config: VertexConfig,
    client: Client,
    tokens: AccessTokenSource,
}

impl VertexClient {
    pub fn new(config: VertexConfig, client: Client, tokens: AccessTokenSource) -> Self {
        Self {
            config,
            client,
            tokens,
        }
    }

    /// Build the API URL for the given model and method.
    fn api_url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:{}",
            self.config.api_base, self.config.project_id, self.config.location, model, method
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: &'a [Content],
    #[serde(flatten)]
    top_level: Map<String, Value>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    generation_config: Map<String, Value>,
}

impl<'a> GenerateContentRequest<'a> {
    fn new(contents: &'a [Content], config: &Map<String, Value>) -> Self {
        let (top_level, generation_config) = config
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .partition(|(key, _)| TOP_LEVEL_KEYS.contains(&key.as_str()));

        Self {
            contents,
            top_level,
            generation_config,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseCandidate {
    content: Option<ResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl GenerateContentResponse {
    /// Text of the first candidate, thought parts excluded.
    fn into_text(self) -> Result<String, ProviderError> {
        let block_reason = self.prompt_feedback.and_then(|f| f.block_reason);

        let Some(candidate) = self.candidates.into_iter().next() else {
            return Err(ProviderError::EmptyResponse(match block_reason {
                Some(reason) => format!("prompt blocked: {}", reason),
                None => "no candidates returned".to_string(),
            }));
        };

        let texts: Vec<String> = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter(|part| !part.thought)
            .filter_map(|part| part.text)
            .collect();

        if texts.is_empty() {
            return Err(ProviderError::EmptyResponse(format!(
                "finish reason {}",
                candidate.finish_reason.as_deref().unwrap_or("unspecified")
            )));
        }

        Ok(texts.concat())
    }
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) => body.chars().take(ERROR_BODY_PREVIEW_CHARS).collect(),
    }
}

#[async_trait]
impl InferenceClient for VertexClient {
    async fn generate(
        &self,
        model: &str,
        contents: &[Content],
        config: &Map<String, Value>,
    ) -> Result<GenerateResponse, ProviderError> {
        if self.config.project_id.is_empty() {
            return Err(ProviderError::NotConfigured(
                "GCP project id not configured".to_string(),
            ));
        }

        let token = self.tokens.token().await?;
        let request = GenerateContentRequest::new(contents, config);
        let url = self.api_url(model, "generateContent");

        tracing::debug!(
            model = %model,
            location = %self.config.location,
            content_count = contents.len(),
            "Sending request to Vertex AI"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(token.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|e| {
                tracing::debug!(error = %e, "Failed to read Vertex AI error body");
                String::new()
            });
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: error_message(&error_text),
            });
        }

        let api_response: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(GenerateResponse {
            text: api_response.into_text()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn request_hoists_top_level_keys() {
        let contents = vec![Content {
            role: Some("user".to_string()),
            parts: vec![json!({"text": "hi"})],
        }];
        let config = json!({
            "temperature": 0.3,
            "systemInstruction": {"parts": [{"text": "be brief"}]},
            "safetySettings": []
        });

        let request = GenerateContentRequest::new(&contents, config.as_object().unwrap());

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "contents": [{"role": "user", "parts": [{"text": "hi"}]}],
                "systemInstruction": {"parts": [{"text": "be brief"}]},
                "safetySettings": [],
                "generationConfig": {"temperature": 0.3}
            })
        );
    }

    #[test]
    fn empty_generation_config_is_omitted() {
        let request = GenerateContentRequest::new(&[], &Map::new());
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"contents": []})
        );
    }

    #[test]
    fn text_parts_are_concatenated_without_thoughts() {
        let response = parse(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "thinking...", "thought": true},
                    {"text": "Hello, "},
                    {"text": "world"}
                ]},
                "finishReason": "STOP"
            }]
        }));

        assert_eq!(response.into_text().unwrap(), "Hello, world");
    }

    #[test]
    fn blocked_prompt_is_an_empty_response() {
        let response = parse(json!({"promptFeedback": {"blockReason": "SAFETY"}}));
        let err = response.into_text().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Response contained no text: prompt blocked: SAFETY"
        );
    }

    #[test]
    fn candidate_without_text_reports_finish_reason() {
        let response = parse(json!({
            "candidates": [{"content": {"parts": [{"functionCall": {"name": "f"}}]}, "finishReason": "STOP"}]
        }));
        let err = response.into_text().unwrap_err();
        assert!(err.to_string().contains("finish reason STOP"));
    }

    #[test]
    fn error_message_prefers_structured_body() {
        let body = r#"{"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(error_message(body), "Quota exceeded");
        assert_eq!(error_message("upstream exploded"), "upstream exploded");
        assert_eq!(error_message(&"x".repeat(2000)).len(), ERROR_BODY_PREVIEW_CHARS);
    }

    #[test]
    fn api_url_targets_publisher_model() {
        let client = VertexClient::new(
            VertexConfig {
                project_id: "demo".to_string(),
                location: "us-central1".to_string(),
                api_base: "https://us-central1-aiplatform.googleapis.com".to_string(),
            },
            Client::new(),
            AccessTokenSource::Static(secrecy::Secret::new("t".to_string())),
        );

        assert_eq!(
            client.api_url("gemini-1.5-flash", "generateContent"),
            "https://us-central1-aiplatform.googleapis.com/v1/projects/demo/locations/us-central1/publishers/google/models/gemini-1.5-flash:generateContent"
        );
    }
}
