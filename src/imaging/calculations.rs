//! Pure calculation functions for image dimensions and crop placement.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::Rect;
use crate::options::{CropMode, ResizeMode};

/// Output size for a resize step.
///
/// `dimension` applies to the edge selected by `mode`; the other edge keeps
/// the source aspect ratio. Without `upscale`, a target larger than the
/// source returns the source size unchanged.
///
/// ```
/// # use imgpipe::imaging::calculate_resize_dimensions;
/// # use imgpipe::options::ResizeMode;
/// assert_eq!(calculate_resize_dimensions((4000, 3000), 1000, ResizeMode::Longest, false), (1000, 750));
/// assert_eq!(calculate_resize_dimensions((400, 300), 1000, ResizeMode::Longest, false), (400, 300));
/// ```
pub fn calculate_resize_dimensions(
    source: (u32, u32),
    dimension: u32,
    mode: ResizeMode,
    upscale: bool,
) -> (u32, u32) {
    let (src_w, src_h) = source;
    if src_w == 0 || src_h == 0 || dimension == 0 {
        return source;
    }

    let edge = match mode {
        ResizeMode::Longest => src_w.max(src_h),
        ResizeMode::Width => src_w,
        ResizeMode::Height => src_h,
    };
    let scale = dimension as f64 / edge as f64;
    if scale > 1.0 && !upscale {
        return source;
    }

    let w = ((src_w as f64 * scale).round() as u32).max(1);
    let h = ((src_h as f64 * scale).round() as u32).max(1);
    (w, h)
}

/// Calculate dimensions needed to fill a target area (resize before crop).
///
/// Returns dimensions that completely cover the target area while maintaining
/// the source aspect ratio. One dimension will match exactly, the other may exceed.
pub fn calculate_fill_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: height will match, width will exceed
        let h = tgt_h;
        let w = (h as f64 * src_aspect).round() as u32;
        (w, h)
    } else {
        // Source is taller: width will match, height will exceed
        let w = tgt_w;
        let h = (w as f64 / src_aspect).round() as u32;
        (w, h)
    }
}

/// Place a `target`-sized window inside `source` according to an anchor mode.
///
/// The window is first clamped to the source. AI modes fall back to centre
/// here; use [`calculate_subject_crop`] when detections are available.
pub fn calculate_anchored_crop(source: (u32, u32), target: (u32, u32), mode: CropMode) -> Rect {
    let (src_w, src_h) = source;
    let w = target.0.min(src_w);
    let h = target.1.min(src_h);
    let free_x = src_w - w;
    let free_y = src_h - h;

    let x = match mode {
        CropMode::Left | CropMode::TopLeft | CropMode::BottomLeft => 0,
        CropMode::Right | CropMode::TopRight | CropMode::BottomRight => free_x,
        _ => free_x / 2,
    };
    let y = match mode {
        CropMode::Top | CropMode::TopLeft | CropMode::TopRight => 0,
        CropMode::Bottom | CropMode::BottomLeft | CropMode::BottomRight => free_y,
        _ => free_y / 2,
    };
    Rect::new(x, y, w, h)
}

/// Centre a `target`-sized window on the bounding box of `subjects`,
/// clamped to the source. Falls back to a centre crop with no subjects.
pub fn calculate_subject_crop(source: (u32, u32), target: (u32, u32), subjects: &[Rect]) -> Rect {
    let Some(bounds) = subjects.iter().copied().reduce(|a, b| a.union(&b)) else {
        return calculate_anchored_crop(source, target, CropMode::Center);
    };

    let (src_w, src_h) = source;
    let w = target.0.min(src_w);
    let h = target.1.min(src_h);
    let (cx, cy) = bounds.center();

    let place = |centre: f64, size: u32, limit: u32| -> u32 {
        let start = (centre - size as f64 / 2.0).round().max(0.0) as u32;
        start.min(limit - size)
    };
    Rect::new(place(cx, w, src_w), place(cy, h, src_h), w, h)
}

/// Percentage (0-100) of total subject area that falls inside `crop`.
///
/// With no subjects nothing can be lost, so the result is 100.
pub fn content_preservation(subjects: &[Rect], crop: &Rect) -> f64 {
    let total: u64 = subjects.iter().map(Rect::area).sum();
    if total == 0 {
        return 100.0;
    }
    let kept: u64 = subjects.iter().map(|s| s.intersection(crop).area()).sum();
    kept as f64 / total as f64 * 100.0
}

/// Largest centred square inside `source`.
pub fn calculate_square_crop(source: (u32, u32)) -> Rect {
    let side = source.0.min(source.1);
    calculate_anchored_crop(source, (side, side), CropMode::Center)
}
