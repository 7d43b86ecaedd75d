//! Adapter over `edgequake-llm` for vendors without an OpenAI-compatible API.
//!
//! The [`ChatRequest`] is rebuilt as one user [`ChatMessage`] holding the
//! prompt text and every page image, with the same token cap and temperature.

use crate::error::{ExtractError, ProviderError};
use crate::pipeline::request::{ChatRequest, IMAGE_DETAIL};
use crate::provider::VisionProvider;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// [`VisionProvider`] backed by any `edgequake-llm` provider.
#[derive(Clone)]
pub struct EdgequakeProvider {
    name: String,
    inner: Arc<dyn LLMProvider>,
}

impl EdgequakeProvider {
    /// Create a named provider (`"anthropic"`, `"gemini"`, `"ollama"`, …).
    ///
    /// The factory reads the vendor's API key from the environment; a
    /// missing key is reported as [`ExtractError::Configuration`].
    pub fn from_name(provider_name: &str, model: &str) -> Result<Self, ExtractError> {
        let inner = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
            ExtractError::Configuration {
                detail: format!("provider '{provider_name}' could not be created"),
                hint: format!("{e}"),
            }
        })?;
        Ok(Self::with_provider(provider_name, inner))
    }

    /// Wrap an already-constructed `edgequake-llm` provider.
    pub fn with_provider(name: impl Into<String>, inner: Arc<dyn LLMProvider>) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }
}

impl fmt::Debug for EdgequakeProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EdgequakeProvider")
            .field("name", &self.name)
            .field("inner", &"<dyn LLMProvider>")
            .finish()
    }
}

impl VisionProvider for EdgequakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let (messages, options) = to_messages(&self.name, request)?;

        info!(
            "Sending {} page images to '{}' (model={})",
            request.images().count(),
            self.name,
            request.model
        );

        let response = self
            .inner
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| ProviderError::Backend {
                provider: self.name.clone(),
                detail: format!("{}", e),
            })?;

        debug!(
            "{} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );

        completion_content(&self.name, response.content)
    }
}

/// Rebuild `request` as a single user message with every page attached.
fn to_messages(
    provider: &str,
    request: &ChatRequest,
) -> Result<(Vec<ChatMessage>, CompletionOptions), ProviderError> {
    let images = to_images(provider, request)?;
    let prompt = request.prompt().unwrap_or_default();
    Ok((vec![ChatMessage::user_with_images(prompt, images)], to_options(request)))
}

fn to_images(provider: &str, request: &ChatRequest) -> Result<Vec<ImageData>, ProviderError> {
    request
        .images()
        .map(|img| {
            let (mime, payload) = img.split_data_uri().ok_or_else(|| ProviderError::Backend {
                provider: provider.to_string(),
                detail: "image part is not a base64 data URI".into(),
            })?;
            Ok(ImageData::new(payload.to_string(), mime.to_string()).with_detail(IMAGE_DETAIL))
        })
        .collect()
}

fn to_options(request: &ChatRequest) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(request.temperature),
        max_tokens: Some(request.max_tokens),
        ..Default::default()
    }
}

fn completion_content(provider: &str, content: String) -> Result<String, ProviderError> {
    if content.trim().is_empty() {
        return Err(ProviderError::EmptyCompletion {
            provider: provider.to_string(),
        });
    }
    Ok(content)
}
