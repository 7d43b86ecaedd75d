//! Direct client for OpenAI-compatible chat-completions endpoints.
//!
//! One POST per call, bearer auth, explicit client timeout, no retry. HTTP
//! failures are classified into [`ProviderError`] variants with the
//! provider's own error message carried through unchanged.

use crate::config::ProviderConfig;
use crate::error::{ExtractError, ProviderError};
use crate::pipeline::request::ChatRequest;
use crate::provider::VisionProvider;
use reqwest::header::RETRY_AFTER;
use serde::Deserialize;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const PROVIDER_NAME: &str = "openai";

/// `reqwest`-backed [`VisionProvider`].
///
/// Cheap to share by reference; read-only after construction.
#[derive(Clone)]
pub struct OpenAiProvider {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout_secs: u64,
}

impl OpenAiProvider {
    /// Build a client from explicit credentials.
    pub fn new(config: &ProviderConfig) -> Result<Self, ExtractError> {
        if config.api_key.trim().is_empty() {
            return Err(ExtractError::Configuration {
                detail: "API key is empty".into(),
                hint: "Pass a non-empty key or set OPENAI_API_KEY.".into(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExtractError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    /// Build a client from `OPENAI_API_KEY` (and optional overrides).
    pub fn from_env() -> Result<Self, ExtractError> {
        Self::new(&ProviderConfig::from_env()?)
    }

    /// Full URL requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn transport_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout {
                provider: PROVIDER_NAME.to_string(),
                secs: self.timeout_secs,
            }
        } else {
            ProviderError::Transport {
                provider: PROVIDER_NAME.to_string(),
                detail: error_chain(&e),
            }
        }
    }
}

impl VisionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let start = Instant::now();
        info!(
            "POST {} (model={}, images={})",
            self.endpoint,
            request.model,
            request.images().count()
        );

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(classify_status(status.as_u16(), &body, retry_after));
        }

        let text = completion_text(&body)?;
        debug!("Provider answered in {:?}", start.elapsed());
        Ok(text)
    }
}

impl fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

// ── Wire types (response side) ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Pull the first choice's text out of a successful response body.
fn completion_text(body: &str) -> Result<String, ProviderError> {
    let parsed: ChatResponse = serde_json::from_str(body).map_err(|e| ProviderError::Api {
        provider: PROVIDER_NAME.to_string(),
        status: 200,
        message: format!("unexpected response body ({e}): {}", truncate(body, 200)),
    })?;

    if let Some(usage) = &parsed.usage {
        debug!(
            "{} input tokens, {} output tokens",
            usage.prompt_tokens, usage.completion_tokens
        );
    }

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::EmptyCompletion {
            provider: PROVIDER_NAME.to_string(),
        })?;

    if choice.finish_reason.as_deref() == Some("length") {
        warn!("Completion hit max_tokens; the JSON is likely truncated");
    }

    match choice.message.content {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(ProviderError::EmptyCompletion {
            provider: PROVIDER_NAME.to_string(),
        }),
    }
}

/// Map a non-success HTTP status to a [`ProviderError`].
fn classify_status(status: u16, body: &str, retry_after_secs: Option<u64>) -> ProviderError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|env| env.error.message)
        .unwrap_or_else(|_| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("HTTP {status}")
            } else {
                truncate(trimmed, 500)
            }
        });
    let provider = PROVIDER_NAME.to_string();

    match status {
        401 | 403 => ProviderError::Auth {
            provider,
            detail: message,
        },
        429 => ProviderError::RateLimited {
            provider,
            retry_after_secs,
            message,
        },
        _ => ProviderError::Api {
            provider,
            status,
            message,
        },
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{head}\u{2026}")
    }
}

fn error_chain(e: &dyn std::error::Error) -> String {
    let mut msg = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        msg.push_str(": ");
        msg.push_str(&inner.to_string());
        source = inner.source();
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_base_url() {
        let config = ProviderConfig::new("sk-test")
            .unwrap()
            .base_url("http://localhost:11434/v1/");
        let provider = OpenAiProvider::new(&config).unwrap();
        assert_eq!(provider.endpoint(), "http://localhost:11434/v1/chat/completions");
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn empty_key_is_rejected() {
        let config = ProviderConfig {
            api_key: String::new(),
            base_url: "http://localhost".into(),
            timeout_secs: 5,
        };
        assert!(matches!(
            OpenAiProvider::new(&config),
            Err(ExtractError::Configuration { .. })
        ));
    }

    #[test]
    fn completion_text_takes_first_choice() {
        let body = r#"{
            "id": "chatcmpl-1",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "{\"a\":1}"}, "finish_reason": "stop"},
                {"index": 1, "message": {"role": "assistant", "content": "ignored"}, "finish_reason": "stop"}
            ],
            "usage": {"prompt_tokens": 1200, "completion_tokens": 40, "total_tokens": 1240}
        }"#;
        assert_eq!(completion_text(body).unwrap(), r#"{"a":1}"#);
    }

    #[test]
    fn missing_choices_or_content_is_empty_completion() {
        assert!(matches!(
            completion_text(r#"{"choices": []}"#),
            Err(ProviderError::EmptyCompletion { .. })
        ));
        assert!(matches!(
            completion_text(r#"{"choices": [{"message": {"content": null}, "finish_reason": "content_filter"}]}"#),
            Err(ProviderError::EmptyCompletion { .. })
        ));
    }

    #[test]
    fn non_json_success_body_is_api_error() {
        match completion_text("<html>gateway</html>") {
            Err(ProviderError::Api { status, message, .. }) => {
                assert_eq!(status, 200);
                assert!(message.contains("<html>"), "got: {message}");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn classify_auth_uses_provider_message() {
        let body = r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}}"#;
        match classify_status(401, body, None) {
            ProviderError::Auth { detail, .. } => assert_eq!(detail, "Incorrect API key provided"),
            other => panic!("expected Auth, got {other:?}"),
        }
        assert!(matches!(classify_status(403, "", None), ProviderError::Auth { .. }));
    }

    #[test]
    fn classify_rate_limit_keeps_retry_after() {
        match classify_status(429, r#"{"error": {"message": "slow down"}}"#, Some(7)) {
            ProviderError::RateLimited {
                retry_after_secs,
                message,
                ..
            } => {
                assert_eq!(retry_after_secs, Some(7));
                assert_eq!(message, "slow down");
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn classify_other_status_falls_back_to_raw_body() {
        match classify_status(502, "Bad Gateway", None) {
            ProviderError::Api { status, message, .. } => {
                assert_eq!(status, 502);
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("expected Api, got {other:?}"),
        }
        match classify_status(500, "   ", None) {
            ProviderError::Api { message, .. } => assert_eq!(message, "HTTP 500"),
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn truncate_marks_cut() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("abcdef", 3), "abc\u{2026}");
    }
}
