//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a JSON-body HTTP response with an appropriate status code.
//!
//! **Security note:** Upstream errors are logged with full detail but only a
//! generic message is returned to the caller so that backend URLs or raw
//! response bodies never leak to clients.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::backend::BackendError;

/// All errors that can occur in the chat-relay request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Propagated from the upstream chat backend.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            // Client-facing errors: expose the message directly.
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),

            // Upstream errors: log the full detail, return a generic message.
            ServerError::Backend(e) => {
                error!(error = %e, "upstream backend error");
                (StatusCode::BAD_GATEWAY, "upstream backend error".to_owned())
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
