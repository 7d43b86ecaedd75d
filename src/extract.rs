//! The extraction client: pages in, [`ExtractionResult`] out.
//!
//! One call to [`ExtractionClient::extract`] is one provider request. There
//! is no cache, no idempotency key and no retry, so calling it twice with the
//! same pages runs (and bills) two independent requests.

use crate::config::{ExtractionConfig, ProviderConfig};
use crate::error::ExtractError;
use crate::pipeline::encode::{encode, EncodedImage};
use crate::pipeline::render::{self, PageImage};
use crate::pipeline::request::{build_request, ChatRequest};
use crate::pipeline::response::{parse_response, ExtractionResult};
use crate::provider::{OpenAiProvider, VisionProvider};
use std::time::Instant;
use tracing::{debug, info};

/// Turns rasterised pages into a typed [`ExtractionResult`] via one model call.
///
/// Read-only after construction. Reusable across sequential requests.
///
/// # Example
/// ```rust,no_run
/// use invoice_extract::ExtractionClient;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ExtractionClient::from_env()?;
/// let bytes = std::fs::read("invoice.pdf")?;
/// let result = client.extract_pdf(&bytes).await?;
/// println!("{} owes {} {}", result.receiver_name, result.supplier_name, result.invoice_total);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ExtractionClient<P = OpenAiProvider> {
    config: ExtractionConfig,
    provider: P,
}

impl ExtractionClient<OpenAiProvider> {
    /// Client for the OpenAI API with default settings, credentials from the
    /// environment. Fails with [`ExtractError::Configuration`] when
    /// `OPENAI_API_KEY` is absent.
    pub fn from_env() -> Result<Self, ExtractError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ExtractError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider_config = ProviderConfig::from_lookup(lookup)?;
        let provider = OpenAiProvider::new(&provider_config)?;
        Ok(Self::new(ExtractionConfig::default(), provider))
    }
}

impl<P: VisionProvider> ExtractionClient<P> {
    pub fn new(config: ExtractionConfig, provider: P) -> Self {
        Self { config, provider }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Encode every page, in order, using the configured format.
    pub fn encode_pages(&self, pages: &[PageImage]) -> Result<Vec<EncodedImage>, ExtractError> {
        pages
            .iter()
            .enumerate()
            .map(|(pos, page)| {
                encode(page, self.config.image_format).map_err(|e| ExtractError::Encoding {
                    page: pos + 1,
                    detail: e.to_string(),
                })
            })
            .collect()
    }

    /// Build the request [`extract`](Self::extract) would send, without sending it.
    pub fn prepare_request(&self, pages: &[PageImage]) -> Result<ChatRequest, ExtractError> {
        if pages.is_empty() {
            return Err(ExtractError::InvalidInput(
                "at least one page is required".into(),
            ));
        }
        let encoded = self.encode_pages(pages)?;
        Ok(build_request(&self.config, &encoded))
    }

    /// Extract the invoice fields from an ordered list of pages.
    ///
    /// # Errors
    /// - [`ExtractError::InvalidInput`] for an empty page list (no provider call)
    /// - [`ExtractError::Provider`] when the single provider call fails
    /// - [`ExtractError::MalformedResponse`] when the answer is not the
    ///   expected JSON object
    pub async fn extract(&self, pages: &[PageImage]) -> Result<ExtractionResult, ExtractError> {
        let start = Instant::now();
        let request = self.prepare_request(pages)?;
        info!(
            "Extracting from {} page(s) via '{}' (model={})",
            pages.len(),
            self.provider.name(),
            request.model
        );

        let text = self.provider.complete(&request).await?;
        debug!("Provider returned {} chars", text.len());

        let result = parse_response(&text)?;
        info!("Extraction complete in {}ms", start.elapsed().as_millis());
        Ok(result)
    }

    /// Rasterise a PDF held in memory, then [`extract`](Self::extract).
    ///
    /// When [`ExtractionConfig::monochrome`] is set, every page is converted
    /// to black and white before encoding.
    pub async fn extract_pdf(&self, bytes: &[u8]) -> Result<ExtractionResult, ExtractError> {
        let render_start = Instant::now();
        let mut pages = render::rasterize(bytes, &self.config.render).await?;
        info!(
            "Rendered {} pages in {}ms",
            pages.len(),
            render_start.elapsed().as_millis()
        );

        if self.config.monochrome {
            pages = pages.iter().map(PageImage::to_monochrome).collect();
        }

        self.extract(&pages).await
    }

    /// Synchronous wrapper around [`extract`](Self::extract).
    ///
    /// Creates a temporary tokio runtime internally; do not call from
    /// inside an async context.
    pub fn extract_sync(&self, pages: &[PageImage]) -> Result<ExtractionResult, ExtractError> {
        runtime()?.block_on(self.extract(pages))
    }

    /// Synchronous wrapper around [`extract_pdf`](Self::extract_pdf).
    pub fn extract_pdf_sync(&self, bytes: &[u8]) -> Result<ExtractionResult, ExtractError> {
        runtime()?.block_on(self.extract_pdf(bytes))
    }
}

fn runtime() -> Result<tokio::runtime::Runtime, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))
}
