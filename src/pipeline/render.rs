//! PDF rasterisation: render every page to a [`PageImage`] via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! [`rasterize`] moves the work onto the blocking pool; [`rasterize_blocking`]
//! is the same contract for callers that are already off the executor.
//!
//! Rendering is all-or-nothing: a document that fails to load, or any page
//! that fails to render, yields [`ExtractError::Rasterization`] and no pages.

use crate::config::{RenderOptions, MAX_DPI, MIN_DPI, MIN_RENDERED_PIXELS};
use crate::error::ExtractError;
use image::imageops::{self, BiLevel};
use image::{DynamicImage, GrayImage};
use once_cell::sync::OnceCell;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

/// Environment variable pointing at an existing pdfium library.
pub const PDFIUM_LIB_PATH_VAR: &str = "PDFIUM_LIB_PATH";

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// How far into the file the `%PDF` header may start.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// One rasterised document page.
#[derive(Debug, Clone)]
pub struct PageImage {
    index: usize,
    image: DynamicImage,
    depth: ColorDepth,
}

impl PageImage {
    /// Wrap a decoded image as page `index` (0-based).
    pub fn new(index: usize, image: DynamicImage) -> Self {
        let depth = ColorDepth::of(&image);
        Self {
            index,
            image,
            depth,
        }
    }

    /// 0-based position of this page in its document.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn color_depth(&self) -> ColorDepth {
        self.depth
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_image(self) -> DynamicImage {
        self.image
    }

    /// Black-and-white copy of this page.
    ///
    /// Converts to luma and applies Floyd–Steinberg dithering so every pixel
    /// is either 0 or 255. The result reports [`ColorDepth::Monochrome`]; the
    /// pixels are stored one per byte because that is the narrowest buffer
    /// the `image` crate offers. `self` is left untouched.
    pub fn to_monochrome(&self) -> PageImage {
        let mut gray: GrayImage = self.image.to_luma8();
        imageops::dither(&mut gray, &BiLevel);
        PageImage {
            index: self.index,
            image: DynamicImage::ImageLuma8(gray),
            depth: ColorDepth::Monochrome,
        }
    }
}

impl From<DynamicImage> for PageImage {
    fn from(image: DynamicImage) -> Self {
        PageImage::new(0, image)
    }
}

/// Colour depth of a [`PageImage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorDepth {
    /// 1 bit per pixel: black or white.
    Monochrome,
    Gray8,
    Rgb8,
    Rgba8,
    /// Any other layout, as total bits per pixel.
    Other(u16),
}

impl ColorDepth {
    fn of(image: &DynamicImage) -> Self {
        match image {
            DynamicImage::ImageLuma8(_) => ColorDepth::Gray8,
            DynamicImage::ImageRgb8(_) => ColorDepth::Rgb8,
            DynamicImage::ImageRgba8(_) => ColorDepth::Rgba8,
            other => ColorDepth::Other(other.color().bits_per_pixel()),
        }
    }

    /// Bits used per pixel.
    pub fn bits_per_pixel(self) -> u16 {
        match self {
            ColorDepth::Monochrome => 1,
            ColorDepth::Gray8 => 8,
            ColorDepth::Rgb8 => 24,
            ColorDepth::Rgba8 => 32,
            ColorDepth::Other(bits) => bits,
        }
    }
}

/// Rasterise every page of a PDF held in memory, in document order.
pub async fn rasterize(bytes: &[u8], options: &RenderOptions) -> Result<Vec<PageImage>, ExtractError> {
    check_magic(bytes)?;

    let data = bytes.to_vec();
    let options = options.clone();

    tokio::task::spawn_blocking(move || rasterize_blocking(&data, &options))
        .await
        .map_err(|e| ExtractError::Internal(format!("Render task panicked: {}", e)))?
}

/// Blocking implementation of [`rasterize`].
pub fn rasterize_blocking(bytes: &[u8], options: &RenderOptions) -> Result<Vec<PageImage>, ExtractError> {
    check_magic(bytes)?;

    let pdfium = bind_pdfium()?;
    let password = options.password.as_deref();

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, password)
        .map_err(|e| load_error(e, password.is_some()))?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let (dpi, max_px) = render_bounds(options);
    let scale = dpi as f32 / 72.0;
    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(scale)
        .set_maximum_width(max_px)
        .set_maximum_height(max_px);

    let mut results = Vec::with_capacity(total_pages);

    for (index, page) in pages.iter().enumerate() {
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| ExtractError::Rasterization {
                detail: format!("page {}: {:?}", index + 1, e),
            })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            index + 1,
            image.width(),
            image.height()
        );

        results.push(PageImage::new(index, image));
    }

    Ok(results)
}

static PDFIUM: OnceCell<Pdfium> = OnceCell::new();

/// Process-wide pdfium handle, bound on first use.
///
/// Lookup order: `PDFIUM_LIB_PATH`, the working directory, the system library.
/// A failed bind is not cached; the next call tries again.
pub fn bind_pdfium() -> Result<&'static Pdfium, ExtractError> {
    PDFIUM.get_or_try_init(bind_pdfium_uncached)
}

fn bind_pdfium_uncached() -> Result<Pdfium, ExtractError> {
    let mut attempts = Vec::new();

    if let Ok(path) = std::env::var(PDFIUM_LIB_PATH_VAR) {
        match Pdfium::bind_to_library(PathBuf::from(&path)) {
            Ok(bindings) => return Ok(Pdfium::new(bindings)),
            Err(e) => attempts.push(format!("{PDFIUM_LIB_PATH_VAR}={path}: {e}")),
        }
    }

    let local = Pdfium::pdfium_platform_library_name_at_path("./");
    let bindings = Pdfium::bind_to_library(&local)
        .or_else(|e| {
            attempts.push(format!("{}: {e}", local.display()));
            Pdfium::bind_to_system_library()
        })
        .map_err(|e| {
            attempts.push(format!("system library: {e}"));
            ExtractError::PdfiumBindingFailed(attempts.join("; "))
        })?;

    info!("pdfium bound");
    Ok(Pdfium::new(bindings))
}

/// DPI and pixel cap from `options`, clamped to what pdfium can render.
fn render_bounds(options: &RenderOptions) -> (u32, i32) {
    let dpi = options.dpi.clamp(MIN_DPI, MAX_DPI);
    let max_px = options
        .max_rendered_pixels
        .clamp(MIN_RENDERED_PIXELS, i32::MAX as u32) as i32;
    (dpi, max_px)
}

fn check_magic(bytes: &[u8]) -> Result<(), ExtractError> {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    if !window.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC) {
        let head: Vec<u8> = bytes.iter().take(PDF_MAGIC.len()).copied().collect();
        return Err(ExtractError::Rasterization {
            detail: format!("input is not a PDF (first bytes: {head:?})"),
        });
    }
    Ok(())
}

fn load_error(e: PdfiumError, had_password: bool) -> ExtractError {
    let err_str = format!("{:?}", e);
    let detail = if err_str.contains("Password") || err_str.contains("password") {
        if had_password {
            "wrong password for encrypted PDF".to_string()
        } else {
            "PDF is encrypted and requires a password".to_string()
        }
    } else {
        format!("PDF is corrupt or unsupported: {err_str}")
    };
    ExtractError::Rasterization { detail }
}
