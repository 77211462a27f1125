//! Server configuration, loaded from environment variables at startup.

/// Runtime configuration for chat-relay.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:8080"`).
    pub bind_address: String,

    /// Base URL of the Ollama backend (default: `"http://localhost:11434"`).
    pub ollama_url: String,

    /// Model name passed to the backend on every request (default: `"llama3"`).
    pub model: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Comma-separated list of allowed CORS origins.
    /// Unset means wildcard – suitable for development only.
    pub cors_allowed_origins: Option<String>,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("CHAT_RELAY_BIND", "0.0.0.0:8080"),
            ollama_url: env_or("CHAT_RELAY_OLLAMA_URL", "http://localhost:11434"),
            model: env_or("CHAT_RELAY_MODEL", "llama3"),
            log_level: env_or("CHAT_RELAY_LOG", "info"),
            log_json: std::env::var("CHAT_RELAY_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            cors_allowed_origins: std::env::var("CHAT_RELAY_CORS_ORIGINS").ok(),
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}
