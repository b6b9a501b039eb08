//! Image transcoding.
//!
//! Decode → optional grayscale → encode to WebP or JPEG. Runs synchronously;
//! callers move it onto the blocking pool.

use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageEncoder as _};

use super::error::RelayError;
use super::policy::TargetFormat;

/// What the client asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeOptions {
    pub format: TargetFormat,
    /// Taken from the query string as-is; the encoder clamps it.
    pub quality: i64,
    pub grayscale: bool,
}

/// Encoded output plus its actual size.
#[derive(Debug, Clone)]
pub struct Transcoded {
    pub data: Vec<u8>,
    pub format: TargetFormat,
    pub size: u64,
}

impl Transcoded {
    pub fn new(data: Vec<u8>, format: TargetFormat) -> Self {
        let size = data.len() as u64;
        Self { data, format, size }
    }
}

/// Re-encodes raw image bytes.
///
/// Object-safe so the server can hold an `Arc<dyn Transcoder>`.
pub trait Transcoder: Send + Sync {
    fn transcode(&self, data: &[u8], options: TranscodeOptions) -> Result<Transcoded, RelayError>;
}

/// Codec backed by the `image` crate (decode, JPEG) and libwebp (lossy WebP).
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageTranscoder;

impl Transcoder for ImageTranscoder {
    fn transcode(&self, data: &[u8], options: TranscodeOptions) -> Result<Transcoded, RelayError> {
        let img = image::load_from_memory(data)
            .map_err(|e| RelayError::transcode(format!("decode: {}", e)))?;

        let img = if options.grayscale { img.grayscale() } else { img };
        let quality = clamp_quality(options.quality);

        let encoded = match options.format {
            TargetFormat::Jpeg => encode_jpeg(&img, quality)?,
            TargetFormat::WebP => encode_webp(&img, quality)?,
        };

        Ok(Transcoded::new(encoded, options.format))
    }
}

/// Both encoders accept 1..=100.
fn clamp_quality(quality: i64) -> u8 {
    quality.clamp(1, 100) as u8
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, RelayError> {
    use image::codecs::jpeg::JpegEncoder;

    let (width, height) = img.dimensions();
    let mut output = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut output, quality);

    // JPEG has no alpha channel; it is dropped here.
    let result = if img.color().has_color() {
        let rgb = img.to_rgb8();
        encoder.write_image(rgb.as_raw(), width, height, image::ColorType::Rgb8)
    } else {
        let luma = img.to_luma8();
        encoder.write_image(luma.as_raw(), width, height, image::ColorType::L8)
    };
    result.map_err(|e| RelayError::transcode(format!("jpeg encode: {}", e)))?;

    Ok(output.into_inner())
}

fn encode_webp(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, RelayError> {
    let (width, height) = img.dimensions();

    let memory = if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        webp::Encoder::from_rgba(rgba.as_raw(), width, height).encode_simple(false, quality as f32)
    } else {
        let rgb = img.to_rgb8();
        webp::Encoder::from_rgb(rgb.as_raw(), width, height).encode_simple(false, quality as f32)
    };

    memory
        .map(|m| m.to_vec())
        .map_err(|e| RelayError::transcode(format!("webp encode: {:?}", e)))
}
