//! Request-scoped middleware.
//!
//! Request-id tagging and access logging are provided by `tower_http` layers
//! in [`crate::api::server::ApiServer::router`]; error-to-response mapping
//! lives on [`crate::api::types::ApiError`]. This module holds handler-level
//! middleware that doesn't fit either of those.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;

/// Wrap request handling in a tracing span carrying the request-id header
/// set by `SetRequestIdLayer`, so every log line inside the handler is
/// correlated with the id returned to the caller.
pub async fn request_span_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let span = tracing::info_span!("request", request_id = %request_id, path = %request.uri().path());
    next.run(request).instrument(span).await
}
