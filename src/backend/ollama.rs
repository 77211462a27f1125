//! Ollama chat backend.
//!
//! Talks to Ollama's `/api/chat` endpoint with `stream: true` and decodes the
//! newline-delimited JSON response into text fragments. A response unit
//! without extractable content degrades to an empty fragment so one malformed
//! unit never aborts the whole reply; a line that is not JSON at all fails
//! the stream.

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{BackendError, ChatBackend, FragmentStream};
use crate::config::Config;

/// Maximum number of upstream body bytes echoed into an error message.
const MAX_ERROR_BODY_BYTES: usize = 256;

/// Streaming client for one Ollama instance.
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(cfg: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: cfg.ollama_url.trim_end_matches('/').to_owned(),
            model: cfg.model.clone(),
        }
    }
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// One line of Ollama's NDJSON stream. Everything is optional so a partial
/// unit still decodes; missing content becomes an empty fragment.
#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ChatBackend for OllamaClient {
    async fn stream_chat(&self, message: &str) -> Result<FragmentStream, BackendError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: message }],
            stream: true,
        };

        let response = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                body: truncate_body(body),
            });
        }

        debug!(model = %self.model, "ollama stream opened");

        let mut bytes = Box::pin(response.bytes_stream());
        let fragments = try_stream! {
            let mut buffer: Vec<u8> = Vec::new();
            let mut done = false;
            'read: while let Some(chunk) = bytes.next().await {
                let chunk = chunk?;
                buffer.extend_from_slice(&chunk);
                while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=pos).collect();
                    if let Some(parsed) = decode_line(&line)? {
                        done = parsed.done;
                        yield fragment_text(parsed);
                        if done {
                            break 'read;
                        }
                    }
                }
            }
            // The stream may end without a trailing newline on the last line.
            if !done {
                if let Some(parsed) = decode_line(&buffer)? {
                    yield fragment_text(parsed);
                }
            }
        };

        Ok(Box::pin(fragments))
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

/// Decode one NDJSON line. Blank lines decode to `None`.
fn decode_line(line: &[u8]) -> Result<Option<ChatChunk>, BackendError> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(text)?))
}

/// Extract the fragment text from a decoded chunk, degrading to empty.
fn fragment_text(chunk: ChatChunk) -> String {
    chunk
        .message
        .and_then(|m| m.content)
        .unwrap_or_default()
}

fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY_BYTES {
        let cut = (0..=MAX_ERROR_BODY_BYTES)
            .rev()
            .find(|&i| body.is_char_boundary(i))
            .unwrap_or(0);
        body.truncate(cut);
        body.push_str("...");
    }
    body
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> Config {
        Config {
            bind_address: "127.0.0.1:0".into(),
            ollama_url: base_url.into(),
            model: "test-model".into(),
            log_level: "info".into(),
            log_json: false,
            cors_allowed_origins: None,
        }
    }

    async fn collect(mut stream: FragmentStream) -> Vec<Result<String, BackendError>> {
        let mut out = Vec::new();
        while let Some(item) = stream.next().await {
            out.push(item);
        }
        out
    }

    #[tokio::test]
    async fn streams_fragments_in_order() {
        let server = MockServer::start().await;
        let body = concat!(
            r#"{"message":{"role":"assistant","content":"Hel"},"done":false}"#,
            "\n",
            r#"{"message":{"role":"assistant","content":"lo"},"done":false}"#,
            "\n",
            r#"{"message":{"role":"assistant","content":""},"done":false}"#,
            "\n",
            r#"{"message":{"role":"assistant","content":" world"},"done":false}"#,
            "\n",
            r#"{"message":{"role":"assistant","content":""},"done":true}"#,
            "\n",
        );
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({
                "model": "test-model",
                "stream": true,
                "messages": [{ "role": "user", "content": "hi" }],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
            .mount(&server)
            .await;

        let client = OllamaClient::new(&test_config(&server.uri()));
        let stream = client.stream_chat("hi").await.unwrap();
        let fragments: Vec<String> = collect(stream)
            .await
            .into_iter()
            .map(|r| r.expect("fragment"))
            .collect();

        // Empty fragments are passed through; filtering is the relay's job.
        assert_eq!(fragments, vec!["Hel", "lo", "", " world", ""]);
    }

    #[tokio::test]
    async fn contentless_chunk_degrades_to_empty() {
        let server = MockServer::start().await;
        let body = concat!(
            r#"{"done":false}"#,
            "\n",
            r#"{"message":{"role":"assistant"},"done":true}"#,
            "\n",
        );
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
            .mount(&server)
            .await;

        let client = OllamaClient::new(&test_config(&server.uri()));
        let stream = client.stream_chat("hi").await.expect("stream");
        let fragments: Vec<String> = collect(stream)
            .await
            .into_iter()
            .map(|r| r.expect("fragment"))
            .collect();

        assert_eq!(fragments, vec!["", ""]);
    }

    #[tokio::test]
    async fn last_line_without_trailing_newline_is_decoded() {
        let server = MockServer::start().await;
        let body = concat!(
            r#"{"message":{"role":"assistant","content":"Hi"},"done":false}"#,
            "\n",
            r#"{"message":{"role":"assistant","content":"!"},"done":false}"#,
        );
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
            .mount(&server)
            .await;

        let client = OllamaClient::new(&test_config(&server.uri()));
        let stream = client.stream_chat("hi").await.expect("stream");
        let fragments: Vec<String> = collect(stream)
            .await
            .into_iter()
            .map(|r| r.expect("fragment"))
            .collect();

        assert_eq!(fragments, vec!["Hi", "!"]);
    }

    #[tokio::test]
    async fn non_success_status_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
            .mount(&server)
            .await;

        let client = OllamaClient::new(&test_config(&server.uri()));
        let err = client.stream_chat("hi").await.err().expect("error");
        match err {
            BackendError::Api { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "model not loaded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn invalid_json_line_fails_stream() {
        let server = MockServer::start().await;
        let body = concat!(
            r#"{"message":{"role":"assistant","content":"Hi"},"done":false}"#,
            "\n",
            "this is not json\n",
        );
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
            .mount(&server)
            .await;

        let client = OllamaClient::new(&test_config(&server.uri()));
        let stream = client.stream_chat("hi").await.expect("stream");
        let items = collect(stream).await;

        assert_eq!(items[0].as_ref().expect("first fragment"), "Hi");
        assert!(matches!(items[1], Err(BackendError::Decode(_))));
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn truncate_body_keeps_short_bodies() {
        assert_eq!(truncate_body("short".into()), "short");
    }

    #[test]
    fn truncate_body_cuts_long_bodies() {
        let long = "x".repeat(MAX_ERROR_BODY_BYTES * 2);
        let cut = truncate_body(long);
        assert_eq!(cut.len(), MAX_ERROR_BODY_BYTES + 3);
        assert!(cut.ends_with("..."));
    }
}
