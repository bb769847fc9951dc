//! Image re-encoding under a byte ceiling
//!
//! Images are decoded, flattened to 8-bit RGB and re-encoded as JPEG at
//! decreasing quality until the encoding fits. Encoded size is assumed to be
//! non-increasing as quality drops, so a linear scan is enough.

use crate::error::{Error, Result};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use tracing::{debug, info};

/// Quality search parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionSettings {
    pub start_quality: u8,
    /// Exclusive lower bound; the search fails once quality reaches it
    pub floor_quality: u8,
    pub step: u8,
    pub ceiling_bytes: usize,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            start_quality: 70,
            floor_quality: 10,
            step: 5,
            ceiling_bytes: 65_535,
        }
    }
}

impl CompressionSettings {
    pub fn validate(&self) -> Result<()> {
        if self.start_quality == 0 || self.start_quality > 100 {
            return Err(Error::Config(
                "image.start_quality must be between 1 and 100".to_string(),
            ));
        }
        if self.floor_quality >= self.start_quality {
            return Err(Error::Config(
                "image.floor_quality must be < image.start_quality".to_string(),
            ));
        }
        if self.step == 0 {
            return Err(Error::Config("image.step must be positive".to_string()));
        }
        if self.ceiling_bytes == 0 {
            return Err(Error::Config(
                "image.ceiling_bytes must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Qualities tried, in order
    pub fn qualities(&self) -> impl Iterator<Item = u8> {
        let floor = self.floor_quality;
        let step = self.step.max(1);
        std::iter::successors(Some(self.start_quality), move |q| q.checked_sub(step))
            .take_while(move |q| *q > floor)
    }
}

/// A successfully re-encoded image
#[derive(Debug, Clone)]
pub struct CompressedImage {
    pub data: Vec<u8>,
    /// Quality of the accepted encoding
    pub quality: u8,
    pub attempts: u32,
}

/// Re-encode `raw` so that it fits in `settings.ceiling_bytes`.
///
/// Fails when the bytes cannot be decoded or when no quality above the floor
/// produces a small enough encoding. An oversized result is never returned.
pub fn compress(raw: &[u8], settings: &CompressionSettings) -> Result<CompressedImage> {
    settings.validate()?;

    let decoded = image::load_from_memory(raw)
        .map_err(|e| Error::ImageCompression(format!("decode failed: {}", e)))?;
    let rgb = decoded.to_rgb8();

    let mut attempts = 0u32;
    let mut smallest = usize::MAX;
    for quality in settings.qualities() {
        attempts += 1;
        let data = encode_jpeg(&rgb, quality)?;
        debug!(quality, size = data.len(), "Encoded image candidate");

        if data.len() <= settings.ceiling_bytes {
            info!(
                "Compressed image to {} bytes at quality {} ({} attempts)",
                data.len(),
                quality,
                attempts
            );
            return Ok(CompressedImage {
                data,
                quality,
                attempts,
            });
        }
        smallest = smallest.min(data.len());
    }

    Err(Error::ImageCompression(format!(
        "could not fit {} bytes above quality {} (smallest attempt {} bytes after {} attempts)",
        settings.ceiling_bytes, settings.floor_quality, smallest, attempts
    )))
}

fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    image
        .write_with_encoder(encoder)
        .map_err(|e| Error::ImageCompression(format!("encode failed: {}", e)))?;
    Ok(buffer)
}
