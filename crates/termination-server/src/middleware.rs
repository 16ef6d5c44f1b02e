//! Request-scoped tracing: one `http_request` span per request.

use std::time::Instant;

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{Instrument, info, info_span};
use ulid::Ulid;

pub static X_REQUEST_ID: &str = "x-request-id";

/// Wrap each request in an `http_request` span carrying a request id.
///
/// The id is taken from `x-request-id` when the caller sent one, otherwise a
/// fresh ULID. It is echoed back on the response.
pub async fn request_span(req: Request, next: Next) -> Response {
    let start_time = Instant::now();

    let request_id = req
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| Ulid::new().to_string());

    let span = info_span!(
        "http_request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        let mut response = next.run(req).await;

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(X_REQUEST_ID, value);
        }

        info!(
            status = response.status().as_u16(),
            latency_ms = u64::try_from(start_time.elapsed().as_millis()).unwrap_or(u64::MAX),
            "request finished"
        );
        response
    }
    .instrument(span)
    .await
}
