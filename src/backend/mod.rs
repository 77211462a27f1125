//! Streaming chat backends.
//!
//! A backend turns one user message into a lazy stream of text fragments.
//! The only real implementation talks to Ollama ([`ollama::OllamaClient`]);
//! the trait exists so the relay pipeline can be tested against a scripted
//! fragment source.

pub mod ollama;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use thiserror::Error;

/// A lazy, cancellable sequence of text fragments from the model.
///
/// Fragments may be empty: a malformed or content-less response unit degrades
/// to the empty string rather than failing the stream. Dropping the stream
/// tears down the underlying backend session.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, BackendError>> + Send>>;

/// Errors produced by a chat backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport-level failure talking to the backend.
    #[error("backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("backend returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// A stream line could not be decoded at all (not even to an empty
    /// fragment).
    #[error("malformed stream chunk: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A chat-completion backend that streams its response incrementally.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send a single-turn chat request and subscribe to the streamed reply.
    ///
    /// The message is passed through unvalidated (empty is allowed); if the
    /// model rejects it, that surfaces as a backend failure. No retries.
    async fn stream_chat(&self, message: &str) -> Result<FragmentStream, BackendError>;
}
