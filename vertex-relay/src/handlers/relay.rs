//! The relay endpoint: Gemini-shaped request in, Vertex AI call, Gemini-shaped
//! response out. Method routing and CORS are handled here rather than by the
//! router so the preflight and error responses keep their exact shape.

use crate::config::MODEL_ID;
use crate::error::RelayError;
use crate::models::{RelayRequest, RelayResponse};
use crate::startup::AppState;
use axum::{
    body::to_bytes,
    extract::{Request, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Largest request body the relay will read.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// JSON response with the CORS origin header every non-preflight reply carries.
pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    (
        status,
        [(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
        Json(body),
    )
        .into_response()
}

fn preflight_response() -> Response {
    (
        StatusCode::NO_CONTENT,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, "POST"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
            (header::ACCESS_CONTROL_MAX_AGE, "3600"),
        ],
    )
        .into_response()
}

pub async fn relay(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, RelayError> {
    if request.method() == Method::OPTIONS {
        return Ok(preflight_response());
    }

    if request.method() != Method::POST {
        return Err(RelayError::MethodNotAllowed);
    }

    let body = to_bytes(request.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|e| RelayError::MalformedBody(e.to_string()))?;
    let payload = RelayRequest::from_slice(&body)?;

    tracing::info!(
        content_count = payload.contents.len(),
        model = MODEL_ID,
        "Calling Vertex AI"
    );

    let response = state
        .inference
        .generate(MODEL_ID, &payload.contents, &payload.generation_config)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, model = MODEL_ID, "Vertex AI API error");
            RelayError::Upstream {
                model: MODEL_ID.to_string(),
                source: e,
            }
        })?;

    tracing::info!(
        response_chars = response.text.chars().count(),
        "Response received"
    );

    Ok(json_response(
        StatusCode::OK,
        &RelayResponse::from_text(response.text, MODEL_ID),
    ))
}
