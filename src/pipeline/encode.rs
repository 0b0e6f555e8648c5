//! Image encoding: `DynamicImage` → PNG bytes → base64 `ImageData`.
//!
//! The renderer hands the OCR stage an opaque PNG buffer; only the VLM
//! engine needs the base64 form. PNG is lossless, so thin digits in table
//! cells survive encoding intact.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!("Encoded {}x{} page → {} PNG bytes", img.width(), img.height(), buf.len());
    Ok(buf)
}

/// Wrap PNG bytes for a multimodal chat message.
///
/// `detail: "high"` lets GPT-4-class models tile the full page; at `low`
/// small print in table footers is unreadable.
pub fn to_image_data(png: &[u8]) -> ImageData {
    ImageData::new(STANDARD.encode(png), "image/png").with_detail("high")
}
