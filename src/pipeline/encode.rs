//! Image encoding: `DynamicImage` → JPEG bytes wrapped in [`PageImage`].
//!
//! Schedules are scanned tables rendered at 2×; a lossless PNG of ten such
//! pages easily exceeds provider upload limits. JPEG at quality 85 keeps the
//! print legible for the model at a fraction of the payload.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tracing::debug;

/// MIME type of every encoded page.
pub const JPEG_MIME: &str = "image/jpeg";

/// One rasterised, compressed document page.
#[derive(Clone, PartialEq, Eq)]
pub struct PageImage {
    /// 1-indexed page number in the source document.
    pub page_number: usize,
    pub width: u32,
    pub height: u32,
    pub mime_type: &'static str,
    /// Encoded image bytes.
    pub data: Vec<u8>,
}

impl PageImage {
    /// Base64 (standard alphabet, padded) of the encoded bytes.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }
}

impl std::fmt::Debug for PageImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageImage")
            .field("page_number", &self.page_number)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Encode a rasterised page as JPEG at the given quality (1–100).
///
/// JPEG has no alpha channel, so the image is flattened to RGB first.
pub fn encode_page(
    img: &DynamicImage,
    page_number: usize,
    quality: u8,
) -> Result<PageImage, image::ImageError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)?;

    debug!(
        "Encoded page {} ({}x{}) → {} bytes JPEG",
        page_number,
        rgb.width(),
        rgb.height(),
        buf.len()
    );

    Ok(PageImage {
        page_number,
        width: rgb.width(),
        height: rgb.height(),
        mime_type: JPEG_MIME,
        data: buf,
    })
}
