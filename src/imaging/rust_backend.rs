//! Pure Rust raster backend built on the `image` crate.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP, ICO) | `image::load_from_memory` |
//! | Identify | decode + alpha scan |
//! | Resize | `DynamicImage::resize_exact` with the step's filter |
//! | Crop | `DynamicImage::crop_imm` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (quality) |
//! | Encode → PNG / ICO | `image::codecs::png` / `image::codecs::ico` |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless only) |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |
//!
//! Intermediate results between steps are PNG, so no quality is lost
//! before the final encode.

use super::backend::{BackendError, RasterBackend};
use super::params::{OutputFormat, Quality, Rect};
use crate::capabilities::SubjectImage;
use crate::options::ResizeAlgorithm;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

/// Largest edge the ICO container can hold.
pub const ICO_MAX_EDGE: u32 = 256;

/// Input extensions whose decoders are compiled in.
pub const SUPPORTED_INPUT_EXTENSIONS: &[&str] =
    &["jpg", "jpeg", "png", "tif", "tiff", "webp", "ico"];

pub fn is_supported_input(ext: &str) -> bool {
    SUPPORTED_INPUT_EXTENSIONS
        .iter()
        .any(|e| e.eq_ignore_ascii_case(ext))
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn filter_type(algorithm: ResizeAlgorithm) -> FilterType {
    match algorithm {
        ResizeAlgorithm::Lanczos3 => FilterType::Lanczos3,
        ResizeAlgorithm::Cubic => FilterType::CatmullRom,
        ResizeAlgorithm::Linear => FilterType::Triangle,
        ResizeAlgorithm::Gaussian => FilterType::Gaussian,
        ResizeAlgorithm::Nearest => FilterType::Nearest,
    }
}

fn decode(bytes: &[u8]) -> Result<DynamicImage, BackendError> {
    image::load_from_memory(bytes)
        .map_err(|e| BackendError::OperationFailed(format!("Failed to decode image: {e}")))
}

fn has_transparency(img: &DynamicImage) -> bool {
    img.color().has_alpha() && img.to_rgba8().pixels().any(|p| p.0[3] < 255)
}

fn write_format(img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, BackendError> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format)
        .map_err(|e| BackendError::OperationFailed(format!("{format:?} encode failed: {e}")))?;
    Ok(buf.into_inner())
}

fn encode_jpeg(img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    let encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality.value() as u8);
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|e| BackendError::OperationFailed(format!("JPEG encode failed: {e}")))?;
    Ok(buf)
}

/// Encode as AVIF using rav1e (speed=6 for reasonable throughput).
fn encode_avif(img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    let encoder =
        image::codecs::avif::AvifEncoder::new_with_speed_quality(&mut buf, 6, quality.value() as u8);
    img.write_with_encoder(encoder)
        .map_err(|e| BackendError::OperationFailed(format!("AVIF encode failed: {e}")))?;
    Ok(buf)
}

fn encode_webp(img: &DynamicImage) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    let encoder = image::codecs::webp::WebPEncoder::new_lossless(&mut buf);
    DynamicImage::ImageRgba8(img.to_rgba8())
        .write_with_encoder(encoder)
        .map_err(|e| BackendError::OperationFailed(format!("WebP encode failed: {e}")))?;
    Ok(buf)
}

impl RasterBackend for RustBackend {
    fn identify(&self, image: &[u8]) -> Result<SubjectImage, BackendError> {
        let format = image::guess_format(image)
            .map(|f| f.to_mime_type())
            .unwrap_or("application/octet-stream");
        let img = decode(image)?;
        Ok(SubjectImage::new(
            img.width(),
            img.height(),
            format,
            has_transparency(&img),
        ))
    }

    fn resize(
        &self,
        image: &[u8],
        width: u32,
        height: u32,
        algorithm: ResizeAlgorithm,
    ) -> Result<Vec<u8>, BackendError> {
        let img = decode(image)?;
        let resized = img.resize_exact(width, height, filter_type(algorithm));
        write_format(&resized, ImageFormat::Png)
    }

    fn crop(&self, image: &[u8], rect: Rect) -> Result<Vec<u8>, BackendError> {
        let img = decode(image)?;
        if rect.width == 0
            || rect.height == 0
            || rect.right() > img.width()
            || rect.bottom() > img.height()
        {
            return Err(BackendError::OperationFailed(format!(
                "crop {}x{}+{}+{} outside {}x{} image",
                rect.width,
                rect.height,
                rect.x,
                rect.y,
                img.width(),
                img.height()
            )));
        }
        let cropped = img.crop_imm(rect.x, rect.y, rect.width, rect.height);
        write_format(&cropped, ImageFormat::Png)
    }

    fn encode(
        &self,
        image: &[u8],
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        let img = decode(image)?;
        match format {
            OutputFormat::Jpeg => encode_jpeg(&img, quality),
            OutputFormat::Png => write_format(&img, ImageFormat::Png),
            OutputFormat::Webp => encode_webp(&img),
            OutputFormat::Avif => encode_avif(&img, quality),
            OutputFormat::Ico => {
                if img.width() > ICO_MAX_EDGE || img.height() > ICO_MAX_EDGE {
                    return Err(BackendError::Unsupported(format!(
                        "ICO larger than {ICO_MAX_EDGE}px"
                    )));
                }
                write_format(&DynamicImage::ImageRgba8(img.to_rgba8()), ImageFormat::Ico)
            }
        }
    }
}
