//! Image processing in pure Rust, statically linked.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::load_from_memory` + alpha scan |
//! | **Resize** | `resize_exact` with the step's filter |
//! | **Crop** | `crop_imm` |
//! | **Encode** | `image` codecs: JPEG, PNG, WebP, AVIF (rav1e), ICO |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension and crop math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`RasterBackend`] trait + [`RustBackend`]

pub mod backend;
pub mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, RasterBackend};
pub use calculations::{
    calculate_anchored_crop, calculate_fill_dimensions, calculate_resize_dimensions,
    calculate_square_crop, calculate_subject_crop, content_preservation,
};
pub use params::{OutputFormat, Quality, Rect};
pub use rust_backend::RustBackend;
