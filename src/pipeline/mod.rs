//! Pipeline stages for invoice extraction.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//! render ──▶ encode ──▶ request ──▶ (provider) ──▶ response
//! (pdfium)   (base64)   (chat body)                (typed JSON)
//! ```
//!
//! 1. [`render`]: rasterise every page; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 2. [`encode`]: PNG/JPEG-encode and base64-wrap each page
//! 3. [`request`]: fixed prompt plus all pages as one user turn
//! 4. [`response`]: parse the completion text into an [`response::ExtractionResult`]

pub mod encode;
pub mod render;
pub mod request;
pub mod response;
