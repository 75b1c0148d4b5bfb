//! Inbound request body, in the public Gemini API shape.

use crate::error::RelayError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One turn of the conversation.
///
/// Parts are carried opaquely; their schema belongs to the upstream API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    pub contents: Vec<Content>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub generation_config: Map<String, Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

fn is_empty_scalar(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(_) => false,
    }
}

impl RelayRequest {
    /// Validate a raw request body.
    ///
    /// Checks run in order: syntax, presence of `contents`, then shape.
    /// An empty object counts as missing `contents`; other empty values are
    /// invalid.
    pub fn from_slice(body: &[u8]) -> Result<Self, RelayError> {
        let value = match serde_json::from_slice::<Value>(body) {
            Ok(value) if !is_empty_scalar(&value) => value,
            _ => return Err(RelayError::InvalidJson),
        };

        let has_contents = value
            .as_object()
            .is_some_and(|obj| obj.contains_key("contents"));
        if !has_contents {
            return Err(RelayError::MissingContents);
        }

        serde_json::from_value(value).map_err(|e| RelayError::MalformedBody(e.to_string()))
    }
}
