//! Outbound response body, mimicking the native `generateContent` response.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayResponse {
    pub candidates: Vec<Candidate>,
    pub usage_metadata: UsageMetadata,
    pub model_version: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: CandidateContent,
    pub finish_reason: String,
    pub index: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateContent {
    pub parts: Vec<TextPart>,
    pub role: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextPart {
    pub text: String,
}

/// Token counts. Always zero: the inference client only surfaces text.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    pub prompt_token_count: u32,
    pub candidates_token_count: u32,
    pub total_token_count: u32,
}

impl RelayResponse {
    /// Wrap generated text as a single finished candidate.
    pub fn from_text(text: String, model: &str) -> Self {
        Self {
            candidates: vec![Candidate {
                content: CandidateContent {
                    parts: vec![TextPart { text }],
                    role: "model".to_string(),
                },
                finish_reason: "STOP".to_string(),
                index: 0,
            }],
            usage_metadata: UsageMetadata::default(),
            model_version: model.to_string(),
        }
    }
}
