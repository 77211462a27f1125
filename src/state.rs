//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::backend::ChatBackend;
use crate::config::Config;

/// State shared across all HTTP handlers.
///
/// The backend sits behind a trait object so tests can substitute a scripted
/// fragment source for the real Ollama client.
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Streaming chat backend.
    pub backend: Arc<dyn ChatBackend>,
}
