//! Raster backend trait and shared types.
//!
//! The [`RasterBackend`] trait defines the four operations the executor
//! needs: identify, resize, crop, and encode. Images travel between steps
//! as encoded bytes; a backend is free to pick its intermediate format.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate.

use super::params::{OutputFormat, Quality, Rect};
use crate::capabilities::SubjectImage;
use crate::options::ResizeAlgorithm;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Operation failed: {0}")]
    OperationFailed(String),
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// Trait for raster backends.
///
/// Implementations must preserve the geometry they are given: the executor
/// computes every target size and crop rectangle itself.
pub trait RasterBackend: Sync {
    /// Size, MIME type and transparency of an encoded image.
    fn identify(&self, image: &[u8]) -> Result<SubjectImage, BackendError>;

    /// Scale to exactly `width`×`height`.
    fn resize(
        &self,
        image: &[u8],
        width: u32,
        height: u32,
        algorithm: ResizeAlgorithm,
    ) -> Result<Vec<u8>, BackendError>;

    /// Cut out `rect`, which lies within the image.
    fn crop(&self, image: &[u8], rect: Rect) -> Result<Vec<u8>, BackendError>;

    /// Final encoding to a deliverable format.
    fn encode(
        &self,
        image: &[u8],
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError>;
}
