//! Image encoding: [`PageImage`] → base64 text wrapped in [`EncodedImage`].
//!
//! VLM APIs accept images as base64 data-URIs embedded in the JSON request
//! body. PNG is the default because it is lossless: text crispness matters
//! far more than file size for reading totals and dates correctly.

use crate::config::PageFormat;
use crate::pipeline::render::PageImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// A page image encoded as base64 text in a declared format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Base64 (standard alphabet, padded) of the encoded image bytes.
    pub data: String,
    pub format: PageFormat,
}

impl EncodedImage {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// `data:<mime>;base64,<data>`, the form the chat API expects.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), self.data)
    }

    /// Decode back into an image.
    pub fn decode(&self) -> Result<DynamicImage, image::ImageError> {
        let bytes = STANDARD.decode(&self.data).map_err(|e| {
            image::ImageError::Decoding(image::error::DecodingError::new(
                image::error::ImageFormatHint::Exact(self.format.to_image_format()),
                e,
            ))
        })?;
        image::load_from_memory_with_format(&bytes, self.format.to_image_format())
    }
}

/// Encode a page in the given format.
///
/// Deterministic: the same page and format always produce the same text.
/// JPEG has no alpha channel, so pages are flattened to RGB first.
pub fn encode(page: &PageImage, format: PageFormat) -> Result<EncodedImage, image::ImageError> {
    let mut buf = Vec::new();
    match format {
        PageFormat::Png => {
            page.image()
                .write_to(&mut Cursor::new(&mut buf), format.to_image_format())?;
        }
        PageFormat::Jpeg => {
            DynamicImage::ImageRgb8(page.image().to_rgb8())
                .write_to(&mut Cursor::new(&mut buf), format.to_image_format())?;
        }
    }

    let data = STANDARD.encode(&buf);
    debug!(
        "Encoded page {} → {} bytes base64 ({})",
        page.index() + 1,
        data.len(),
        format.mime_type()
    );

    Ok(EncodedImage { data, format })
}

/// Encode a page as PNG.
pub fn encode_png(page: &PageImage) -> Result<EncodedImage, image::ImageError> {
    encode(page, PageFormat::Png)
}
