// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image decoding for detection requests
//!
//! Inline payloads are decoded straight from memory; uploads and fetched
//! URLs are decoded from their staged temp file.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat};
use std::path::Path;
use thiserror::Error;

/// Custom error types for image processing
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image data is too large: {0} bytes (max: {1} bytes)")]
    TooLarge(usize, usize),

    #[error("Invalid base64 encoding: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Unsupported image format")]
    UnsupportedFormat,

    #[error("Failed to decode image: {0}")]
    DecodeFailed(String),

    #[error("Image data is empty")]
    EmptyData,

    #[error("Failed to read staged image: {0}")]
    Io(#[from] std::io::Error),
}

/// Image information extracted during loading
#[derive(Debug, Clone)]
pub struct ImageInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Detected format
    pub format: ImageFormat,
    /// Size in bytes
    pub size_bytes: usize,
}

/// Decode a base64-encoded image
///
/// Accepts bare base64 as well as `data:image/...;base64,` URLs. ASCII
/// whitespace is ignored, so MIME-style line-wrapped payloads decode too.
pub fn decode_base64_image(
    base64_str: &str,
    max_bytes: usize,
) -> Result<(DynamicImage, ImageInfo), ImageError> {
    let payload = strip_data_url(base64_str.trim());
    let unwrapped: String;
    let payload = if payload.bytes().any(|b| b.is_ascii_whitespace()) {
        unwrapped = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        unwrapped.as_str()
    } else {
        payload
    };
    if payload.is_empty() {
        return Err(ImageError::EmptyData);
    }

    // base64 inflates by 4/3, reject before allocating the decoded buffer
    if payload.len() / 4 * 3 > max_bytes.saturating_add(3) {
        return Err(ImageError::TooLarge(payload.len() / 4 * 3, max_bytes));
    }

    let bytes = STANDARD.decode(payload)?;
    decode_image_bytes(&bytes, max_bytes)
}

/// Decode raw image bytes
pub fn decode_image_bytes(
    bytes: &[u8],
    max_bytes: usize,
) -> Result<(DynamicImage, ImageInfo), ImageError> {
    if bytes.len() > max_bytes {
        return Err(ImageError::TooLarge(bytes.len(), max_bytes));
    }

    if bytes.is_empty() {
        return Err(ImageError::EmptyData);
    }

    let format = detect_format(bytes)?;

    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ImageError::DecodeFailed(e.to_string()))?;

    let info = ImageInfo {
        width: img.width(),
        height: img.height(),
        format,
        size_bytes: bytes.len(),
    };

    Ok((img, info))
}

/// Decode an image staged on disk
pub fn decode_image_file(
    path: &Path,
    max_bytes: usize,
) -> Result<(DynamicImage, ImageInfo), ImageError> {
    let len = std::fs::metadata(path)?.len();
    if len > max_bytes as u64 {
        return Err(ImageError::TooLarge(
            usize::try_from(len).unwrap_or(usize::MAX),
            max_bytes,
        ));
    }
    let bytes = std::fs::read(path)?;
    decode_image_bytes(&bytes, max_bytes)
}

/// Detect image format from magic bytes
pub fn detect_format(bytes: &[u8]) -> Result<ImageFormat, ImageError> {
    if bytes.len() < 4 {
        return Err(ImageError::UnsupportedFormat);
    }

    match bytes {
        // PNG: 89 50 4E 47 (0x89 P N G)
        [0x89, 0x50, 0x4E, 0x47, ..] => Ok(ImageFormat::Png),

        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Ok(ImageFormat::Jpeg),

        // WebP: RIFF .... WEBP
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Ok(ImageFormat::WebP),

        // GIF: GIF87a or GIF89a
        [0x47, 0x49, 0x46, 0x38, x, ..] if *x == 0x37 || *x == 0x39 => Ok(ImageFormat::Gif),

        // BMP: BM
        [0x42, 0x4D, ..] => Ok(ImageFormat::Bmp),

        // TIFF: II (little-endian) or MM (big-endian)
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => Ok(ImageFormat::Tiff),

        _ => Err(ImageError::UnsupportedFormat),
    }
}

/// Get the format extension as a string
pub fn format_to_extension(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "png",
        ImageFormat::Jpeg => "jpg",
        ImageFormat::WebP => "webp",
        ImageFormat::Gif => "gif",
        ImageFormat::Bmp => "bmp",
        ImageFormat::Tiff => "tiff",
        _ => "bin",
    }
}

fn strip_data_url(input: &str) -> &str {
    if input.starts_with("data:") {
        if let Some(idx) = input.find(";base64,") {
            return &input[idx + ";base64,".len()..];
        }
    }
    input
}
