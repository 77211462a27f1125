//! Per-request tracing middleware.
//!
//! Wraps every request in an `http_request` span carrying a trace ID that is
//! either propagated from the `x-trace-id` request header or freshly
//! generated. The chat response body is an unbounded event stream, so this
//! middleware never buffers bodies; it only logs request start/finish with
//! status and latency.

use std::time::Instant;

use axum::body::Body;
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

pub static X_TRACE_ID: &str = "x-trace-id";

pub async fn trace_middleware(mut req: Request<Body>, next: Next) -> Response {
    let start_time = Instant::now();

    let trace_id = req
        .headers()
        .get(X_TRACE_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let span = info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %method,
        path = %path,
    );

    async move {
        info!("→ request started");

        // A UUID string is always a valid header value.
        let header_value = trace_id.to_string().parse().unwrap();
        req.headers_mut().insert(X_TRACE_ID, header_value);

        let mut response = next.run(req).await;

        response
            .headers_mut()
            .insert(X_TRACE_ID, trace_id.to_string().parse().unwrap());

        info!(
            status = response.status().as_u16(),
            latency_ms = start_time.elapsed().as_millis() as u64,
            "← response headers sent"
        );

        response
    }
    .instrument(span)
    .await
}
