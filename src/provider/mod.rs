//! Model providers: the seam between request assembly and the network.
//!
//! [`VisionProvider`] takes a fully built [`ChatRequest`] and returns the
//! completion text of the first choice. Everything before (prompt, images,
//! ordering) and after (JSON parsing) lives in [`crate::pipeline`], so a
//! provider only moves bytes and classifies failures.
//!
//! Two implementations ship with the crate:
//!
//! * [`OpenAiProvider`]: direct `reqwest` client for any OpenAI-compatible
//!   chat-completions endpoint. The default.
//! * [`EdgequakeProvider`]: any vendor `edgequake-llm` can reach
//!   (Anthropic, Gemini, Ollama, …).

use crate::error::ProviderError;
use crate::pipeline::request::ChatRequest;
use std::future::Future;

pub mod edgequake;
pub mod openai;

pub use edgequake::EdgequakeProvider;
pub use openai::OpenAiProvider;

/// A vision-capable chat model.
///
/// Implementations perform exactly one call per [`complete`](Self::complete)
/// and never retry. The returned future is `Send`, so an extraction can be
/// handed to `tokio::spawn`.
pub trait VisionProvider: Send + Sync {
    /// Short provider name used in logs and error messages.
    fn name(&self) -> &str;

    /// Submit `request` and return the first choice's message text.
    fn complete(
        &self,
        request: &ChatRequest,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send;
}
