//! Error types for the invoice-extract library.
//!
//! Every failure surfaces synchronously to the caller of the operation that
//! failed. Nothing is retried and nothing is logged-and-continued, so there is
//! one fatal error type, [`ExtractError`], with the provider-side failures
//! broken out into [`ProviderError`] for callers that want to match on them.

use std::fmt;
use thiserror::Error;

/// All errors returned by the invoice-extract library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Startup errors ────────────────────────────────────────────────────
    /// A required credential is missing. Raised while building a client,
    /// before any request can be made.
    #[error("Provider is not configured: {detail}\n{hint}")]
    Configuration { detail: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Document errors ───────────────────────────────────────────────────
    /// The input bytes could not be decoded as a PDF, or a page failed to render.
    #[error("Rasterisation failed: {detail}")]
    Rasterization { detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, place the library in the working\n\
directory, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Extraction errors ─────────────────────────────────────────────────
    /// Extraction was called with an unusable input (e.g. zero pages).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A page image could not be encoded for the request payload.
    #[error("Failed to encode page {page}: {detail}")]
    Encoding { page: usize, detail: String },

    /// The provider call failed. Never retried.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The provider answered, but the text is not the expected JSON object.
    ///
    /// `raw` holds the complete response text for diagnosis.
    #[error("Malformed model response ({kind}): {detail}\nRaw response:\n{raw}")]
    MalformedResponse {
        kind: MalformedKind,
        detail: String,
        raw: String,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExtractError {
    /// The raw provider text attached to a malformed-response error.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            ExtractError::MalformedResponse { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

/// Why a provider response was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedKind {
    /// The text does not parse as JSON at all (prose, code fences, truncation).
    InvalidJson,
    /// Valid JSON, but missing required keys or carrying wrong value types.
    SchemaMismatch,
}

impl fmt::Display for MalformedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedKind::InvalidJson => f.write_str("invalid JSON"),
            MalformedKind::SchemaMismatch => f.write_str("schema mismatch"),
        }
    }
}

/// Failures raised by a [`crate::provider::VisionProvider`].
///
/// Provider diagnostics are carried verbatim in the message fields.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Network-level failure: DNS, connect, TLS, connection reset.
    #[error("Request to provider '{provider}' failed: {detail}")]
    Transport { provider: String, detail: String },

    /// The HTTP client gave up waiting for a response.
    #[error("Provider '{provider}' did not respond within {secs}s")]
    Timeout { provider: String, secs: u64 },

    /// 401/403 from the provider.
    #[error("Authentication error from provider '{provider}': {detail}\nCheck the provider API key.")]
    Auth { provider: String, detail: String },

    /// 429 from the provider.
    #[error("Rate limit exceeded for provider '{provider}'{}: {message}", retry_hint(.retry_after_secs))]
    RateLimited {
        provider: String,
        retry_after_secs: Option<u64>,
        message: String,
    },

    /// Any other non-success response, or a model-side error.
    #[error("Provider '{provider}' returned an error (status {status}): {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    /// Failure reported by a third-party client library, passed through as text.
    #[error("Provider '{provider}' failed: {detail}")]
    Backend { provider: String, detail: String },

    /// The provider answered successfully but without any completion text.
    #[error("Provider '{provider}' returned no completion text")]
    EmptyCompletion { provider: String },
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    match retry_after_secs {
        Some(secs) => format!(" (retry after {secs}s)"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_display_includes_raw_text() {
        let e = ExtractError::MalformedResponse {
            kind: MalformedKind::InvalidJson,
            detail: "expected value at line 1 column 1".into(),
            raw: "```json\n{}\n```".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("invalid JSON"), "got: {msg}");
        assert!(msg.contains("```json"), "got: {msg}");
        assert_eq!(e.raw_response(), Some("```json\n{}\n```"));
    }

    #[test]
    fn schema_mismatch_kind_display() {
        assert_eq!(MalformedKind::SchemaMismatch.to_string(), "schema mismatch");
    }

    #[test]
    fn rate_limit_display_with_retry() {
        let e = ProviderError::RateLimited {
            provider: "openai".into(),
            retry_after_secs: Some(20),
            message: "Rate limit reached for requests".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("openai"));
        assert!(msg.contains("retry after 20s"), "got: {msg}");
        assert!(msg.ends_with("Rate limit reached for requests"), "got: {msg}");
    }

    #[test]
    fn rate_limit_display_without_retry() {
        let e = ProviderError::RateLimited {
            provider: "gemini".into(),
            retry_after_secs: None,
            message: "quota exhausted".into(),
        };
        assert_eq!(
            e.to_string(),
            "Rate limit exceeded for provider 'gemini': quota exhausted"
        );
    }

    #[test]
    fn provider_error_is_transparent() {
        let e: ExtractError = ProviderError::Api {
            provider: "openai".into(),
            status: 500,
            message: "The server had an error".into(),
        }
        .into();
        assert_eq!(
            e.to_string(),
            "Provider 'openai' returned an error (status 500): The server had an error"
        );
        assert!(e.raw_response().is_none());
    }
}
