//! Configuration types for invoice extraction.
//!
//! Two structs, two concerns:
//!
//! * [`ExtractionConfig`]: what the request looks like (model, token cap,
//!   image encoding) and how pages are rasterised. Built via
//!   [`ExtractionConfigBuilder`]; contains no secrets.
//! * [`ProviderConfig`]: where the request goes and with which credential.
//!   Looked up explicitly from the environment by [`ProviderConfig::from_env`]
//!   so a missing key is a construction-time error, never a per-request one.

use crate::error::ExtractError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default vision-capable model.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Default vision model for a provider name, case-insensitive.
///
/// `None` for providers without a known vision default; callers must then
/// name a model explicitly.
pub fn default_model_for(provider: &str) -> Option<&'static str> {
    match provider.to_ascii_lowercase().as_str() {
        "openai" | "azure" => Some(DEFAULT_MODEL),
        "anthropic" => Some("claude-sonnet-4-20250514"),
        "gemini" => Some("gemini-2.0-flash"),
        "ollama" | "lmstudio" => Some("llava"),
        _ => None,
    }
}

/// Default response length cap, in tokens.
pub const DEFAULT_MAX_TOKENS: usize = 4096;

/// Default OpenAI-compatible API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default HTTP timeout for the provider call, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Lowest accepted rendering DPI.
pub const MIN_DPI: u32 = 72;

/// Highest accepted rendering DPI.
pub const MAX_DPI: u32 = 400;

/// Smallest accepted cap on a rendered page's longest edge.
pub const MIN_RENDERED_PIXELS: u32 = 100;

/// Environment variable holding the provider credential.
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Optional environment variable overriding [`DEFAULT_BASE_URL`].
pub const BASE_URL_VAR: &str = "OPENAI_BASE_URL";

/// Optional environment variable overriding [`DEFAULT_TIMEOUT_SECS`].
pub const TIMEOUT_VAR: &str = "INVOICE_EXTRACT_TIMEOUT_SECS";

/// Configuration for an extraction run.
///
/// # Example
/// ```rust
/// use invoice_extract::{ExtractionConfig, PageFormat};
///
/// let config = ExtractionConfig::builder()
///     .model("gpt-4o")
///     .max_tokens(2048)
///     .image_format(PageFormat::Png)
///     .dpi(200)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_tokens, 2048);
/// ```
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Vision-capable model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Maximum tokens the model may generate. Default: 4096.
    pub max_tokens: usize,

    /// Encoding used for page images in the request. Default: PNG.
    pub image_format: PageFormat,

    /// Convert every page to 1-bit black and white before encoding.
    /// Default: false.
    pub monochrome: bool,

    /// Rasterisation settings used by [`crate::ExtractionClient::extract_pdf`].
    pub render: RenderOptions,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            image_format: PageFormat::default(),
            monochrome: false,
            render: RenderOptions::default(),
        }
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn image_format(mut self, format: PageFormat) -> Self {
        self.config.image_format = format;
        self
    }

    pub fn monochrome(mut self, v: bool) -> Self {
        self.config.monochrome = v;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.render.dpi = dpi.clamp(MIN_DPI, MAX_DPI);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.render.max_rendered_pixels = px.max(MIN_RENDERED_PIXELS);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.render.password = Some(pwd.into());
        self
    }

    pub fn render(mut self, render: RenderOptions) -> Self {
        self.config.render = render;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(ExtractError::InvalidConfig("model must not be empty".into()));
        }
        if c.max_tokens == 0 {
            return Err(ExtractError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if !(MIN_DPI..=MAX_DPI).contains(&c.render.dpi) {
            return Err(ExtractError::InvalidConfig(format!(
                "DPI must be {MIN_DPI}–{MAX_DPI}, got {}",
                c.render.dpi
            )));
        }
        let max_px = c.render.max_rendered_pixels;
        if max_px < MIN_RENDERED_PIXELS || max_px > i32::MAX as u32 {
            return Err(ExtractError::InvalidConfig(format!(
                "max_rendered_pixels must be between {MIN_RENDERED_PIXELS} and {}, got {}",
                i32::MAX,
                max_px
            )));
        }
        Ok(self.config)
    }
}

/// How PDF pages are rasterised.
#[derive(Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Rendering resolution. Range: 72–400. Default: 200.
    pub dpi: u32,

    /// Cap on the longest edge of a rendered page, in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// User password for encrypted documents.
    pub password: Option<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            dpi: 200,
            max_rendered_pixels: 2000,
            password: None,
        }
    }
}

impl fmt::Debug for RenderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderOptions")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Image encoding used for page attachments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageFormat {
    /// Lossless; keeps small print crisp. (default)
    #[default]
    Png,
    /// Smaller payloads for photo-like scans. Alpha is dropped.
    Jpeg,
}

impl PageFormat {
    /// MIME type declared in the data URI.
    pub fn mime_type(self) -> &'static str {
        match self {
            PageFormat::Png => "image/png",
            PageFormat::Jpeg => "image/jpeg",
        }
    }

    pub(crate) fn to_image_format(self) -> image::ImageFormat {
        match self {
            PageFormat::Png => image::ImageFormat::Png,
            PageFormat::Jpeg => image::ImageFormat::Jpeg,
        }
    }
}

/// Credentials and endpoint for the OpenAI-compatible provider.
#[derive(Clone)]
pub struct ProviderConfig {
    /// Bearer token sent with every request.
    pub api_key: String,

    /// API root; `/chat/completions` is appended.
    pub base_url: String,

    /// HTTP timeout for the single provider call.
    pub timeout_secs: u64,
}

impl ProviderConfig {
    /// Create a provider config with default endpoint and timeout.
    ///
    /// An empty key is rejected with [`ExtractError::Configuration`].
    pub fn new(api_key: impl Into<String>) -> Result<Self, ExtractError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(missing_key());
        }
        Ok(Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        })
    }

    /// Read the provider config from the process environment.
    pub fn from_env() -> Result<Self, ExtractError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the provider config through an arbitrary variable lookup.
    ///
    /// `OPENAI_API_KEY` is required. `OPENAI_BASE_URL` and
    /// `INVOICE_EXTRACT_TIMEOUT_SECS` are optional.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ExtractError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_VAR).ok_or_else(missing_key)?;
        let mut config = Self::new(api_key)?;

        if let Some(url) = lookup(BASE_URL_VAR).filter(|u| !u.trim().is_empty()) {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(raw) = lookup(TIMEOUT_VAR) {
            config.timeout_secs = raw.trim().parse().map_err(|_| {
                ExtractError::InvalidConfig(format!(
                    "{TIMEOUT_VAR} must be a whole number of seconds, got {raw:?}"
                ))
            })?;
        }
        Ok(config)
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn missing_key() -> ExtractError {
    ExtractError::Configuration {
        detail: format!("{API_KEY_VAR} is not set"),
        hint: format!("Export it (export {API_KEY_VAR}=sk-...) or add it to a .env file."),
    }
}
