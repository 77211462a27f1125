//! SSE chat relay route.
//!
//! `GET /chat?message=...` forwards the message to the chat backend and
//! relays the streamed reply as Server-Sent Events. Empty fragments are
//! dropped, survivors are numbered from 1, and the stream always ends with a
//! single `complete` event carrying the literal `[DONE]` payload. If the
//! backend fails mid-stream the response body is terminated abnormally and no
//! `complete` event is emitted.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::response::sse::{Event, Sse};
use axum::routing::get;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::backend::{BackendError, FragmentStream};
use crate::error::ServerError;
use crate::state::AppState;

/// Register the chat relay route.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/chat", get(chat))
}

#[derive(Deserialize)]
pub struct ChatParams {
    message: Option<String>,
}

/// Relay one chat reply as an SSE stream (`GET /chat?message=...`).
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ChatParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, BackendError>>>, ServerError> {
    let message = params
        .message
        .ok_or_else(|| ServerError::BadRequest("missing required query parameter `message`".into()))?;

    debug!(message_len = message.len(), "chat stream requested");

    let fragments = state.backend.stream_chat(&message).await?;
    Ok(Sse::new(relay_events(fragments)))
}

/// Turn a fragment stream into the outbound SSE event stream.
///
/// Event ids are strictly increasing from 1, the id counter is owned by this
/// request's stream, and the terminal `complete` event takes the id after the
/// last relayed fragment.
fn relay_events(mut fragments: FragmentStream) -> impl Stream<Item = Result<Event, BackendError>> {
    async_stream::try_stream! {
        let mut next_id: u64 = 1;
        while let Some(fragment) = fragments.next().await {
            let fragment = fragment?;
            if fragment.is_empty() {
                continue;
            }
            yield Event::default()
                .id(next_id.to_string())
                .event("message")
                .data(json!({ "content": fragment }).to_string());
            next_id += 1;
        }
        yield Event::default()
            .id(next_id.to_string())
            .event("complete")
            .data(json!({ "content": "[DONE]" }).to_string());
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
