use axum::http::HeaderValue;
use axum::{extract::Request, middleware::Next, response::Response};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Caller-supplied ids longer than this are replaced.
const MAX_REQUEST_ID_LEN: usize = 128;

fn caller_request_id(req: &Request) -> Option<HeaderValue> {
    let value = req.headers().get(REQUEST_ID_HEADER)?;
    let id = value.to_str().ok()?;
    (!id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN).then(|| value.clone())
}

/// Propagate the caller's `x-request-id`, or mint one, and echo it on the response.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = caller_request_id(&req).unwrap_or_else(|| {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("unknown"))
    });

    req.headers_mut().insert(REQUEST_ID_HEADER, request_id.clone());

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let mut response = next.run(req).await;

    tracing::debug!(
        request_id = ?request_id,
        %method,
        path = %path,
        status = response.status().as_u16(),
        "Request completed"
    );

    response.headers_mut().insert(REQUEST_ID_HEADER, request_id);

    response
}
