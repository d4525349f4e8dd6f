//! Request ids and completion logging.

use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    response::Response,
};
use std::time::Instant;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use super::{Interceptor, Next};

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Tags each request with an id (reusing the client's `x-request-id` if it sent
/// one), runs the rest of the chain inside a span carrying it, and echoes it
/// back on the response.
pub struct RequestTracing;

#[async_trait]
impl Interceptor for RequestTracing {
    async fn intercept(&self, request: Request, next: Next<'_>) -> Response {
        let request_id = request
            .headers()
            .get(&REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let span = info_span!(
            "request",
            request_id = %request_id,
            method = %request.method(),
            path = %request.uri().path(),
        );
        let started = Instant::now();

        let mut response = next.run(request).instrument(span.clone()).await;

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        span.in_scope(|| {
            info!(
                status = response.status().as_u16(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Request finished"
            )
        });
        response
    }
}
