//! # invoice-extract
//!
//! Pull the buyer, seller, total and date out of a PDF invoice or purchase
//! order with a Vision Language Model (VLM).
//!
//! The crate does no OCR of its own. It rasterises each page, attaches the
//! images to one request with a fixed extraction prompt, and parses the
//! model's JSON answer into a typed [`ExtractionResult`].
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Render   rasterise every page via pdfium (spawn_blocking)
//!  ├─ 2. Encode   PNG → base64 data URI, page order preserved
//!  ├─ 3. Request  fixed prompt + all pages as one user turn, temperature 0
//!  ├─ 4. Provider one call, no retry
//!  └─ 5. Parse    bare JSON → ExtractionResult (fences are an error)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use invoice_extract::ExtractionClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Fails here, before any request, when OPENAI_API_KEY is missing.
//!     let client = ExtractionClient::from_env()?;
//!     let bytes = std::fs::read("invoice.pdf")?;
//!     let result = client.extract_pdf(&bytes).await?;
//!     println!("{}", serde_json::to_string_pretty(&result)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `invoice-extract` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod prompts;
pub mod provider;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, PageFormat, ProviderConfig, RenderOptions};
pub use error::{ExtractError, MalformedKind, ProviderError};
pub use extract::ExtractionClient;
pub use pipeline::encode::{encode, encode_png, EncodedImage};
pub use pipeline::render::{rasterize, rasterize_blocking, ColorDepth, PageImage};
pub use pipeline::request::ChatRequest;
pub use pipeline::response::{parse_response, ExtractionResult};
pub use prompts::EXTRACTION_PROMPT;
pub use provider::{EdgequakeProvider, OpenAiProvider, VisionProvider};
