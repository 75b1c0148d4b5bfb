use crate::handlers::relay::json_response;
use crate::services::providers::ProviderError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Every way a relay request can fail. The display text is the `error` field
/// returned to the caller.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Method not allowed. Use POST.")]
    MethodNotAllowed,

    #[error("Invalid JSON in request body")]
    InvalidJson,

    #[error("Failed to parse JSON: {0}")]
    MalformedBody(String),

    #[error("Missing \"contents\" field in request")]
    MissingContents,

    #[error("Vertex AI API call failed: {source}")]
    Upstream {
        model: String,
        #[source]
        source: ProviderError,
    },
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            RelayError::InvalidJson
            | RelayError::MalformedBody(_)
            | RelayError::MissingContents => StatusCode::BAD_REQUEST,
            RelayError::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            model: Option<String>,
        }

        let status = self.status();
        let error = self.to_string();
        let model = match self {
            RelayError::Upstream { model, .. } => Some(model),
            _ => None,
        };

        json_response(status, &ErrorResponse { error, model })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_wire_contract() {
        assert_eq!(
            RelayError::MethodNotAllowed.to_string(),
            "Method not allowed. Use POST."
        );
        assert_eq!(
            RelayError::InvalidJson.to_string(),
            "Invalid JSON in request body"
        );
        assert_eq!(
            RelayError::MissingContents.to_string(),
            r#"Missing "contents" field in request"#
        );
        assert_eq!(
            RelayError::MalformedBody("eof".to_string()).to_string(),
            "Failed to parse JSON: eof"
        );
    }

    #[test]
    fn upstream_failure_wraps_provider_message() {
        let err = RelayError::Upstream {
            model: "gemini-1.5-flash".to_string(),
            source: ProviderError::Api {
                status: 403,
                message: "Permission denied".to_string(),
            },
        };

        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            err.to_string(),
            "Vertex AI API call failed: Upstream returned 403: Permission denied"
        );
    }

    #[test]
    fn statuses() {
        assert_eq!(
            RelayError::MethodNotAllowed.status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(RelayError::InvalidJson.status(), StatusCode::BAD_REQUEST);
        assert_eq!(RelayError::MissingContents.status(), StatusCode::BAD_REQUEST);
    }
}
