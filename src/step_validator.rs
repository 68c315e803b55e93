//! Per-step option validation.
//!
//! [`validate_step`] checks one step's resolved options, optionally against
//! the image it will run on. Image-dependent rules are skipped, not guessed,
//! when no image is given. The validator knows nothing about step positions;
//! the task tags messages with the step's `order` afterwards.
//!
//! | kind | errors | warnings |
//! |---|---|---|
//! | resize | `dimension <= 0` | `< 10`, above `maxDimension`, upscale needed but disabled |
//! | crop | width/height `<= 0` | `< 10`, aspect outside 1:10..10:1, AI threshold `< 50`, larger than source |
//! | optimize | quality outside 1..=100, unknown format | `> 95`, `< 50`, JPEG + transparency, AVIF + legacy browsers, aggressive + `< 60` |
//! | rename | blank pattern, forbidden characters | no unique placeholder |
//! | favicon | no sizes | size `< 16` / `> 1024`, unknown format, small or non-square source |
//! | template | no `templateId` | |

use crate::capabilities::SubjectImage;
use crate::options::{
    CompressionMode, CropOptions, FaviconOptions, OptimizeOptions, RenameOptions, ResizeOptions,
    StepOptions, TemplateOptions, is_jpeg,
};
use crate::validation::{ValidationMessage, ValidationResult, codes};

/// Encodings the optimize step can target.
pub const OPTIMIZE_FORMATS: &[&str] = &["auto", "jpg", "jpeg", "png", "webp", "avif"];

/// Encodings a favicon set can contain.
pub const FAVICON_FORMATS: &[&str] = &["png", "ico", "svg"];

/// Characters that are illegal in file names on at least one major platform.
pub const FORBIDDEN_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Placeholders that keep batch output names from colliding.
pub const UNIQUE_PLACEHOLDERS: &[&str] = &["{name}", "{index}", "{timestamp}"];

const MIN_USEFUL_DIMENSION: i64 = 10;
const ASPECT_RATIO_RANGE: (f64, f64) = (0.1, 10.0);
const MIN_AI_CONFIDENCE: f64 = 50.0;
const FAVICON_RECOMMENDED_MIN: i64 = 16;
const FAVICON_UNUSUALLY_LARGE: i64 = 1024;
const SQUARE_TOLERANCE: f64 = 0.1;

/// Validate one step's options.
pub fn validate_step(options: &StepOptions, image: Option<&SubjectImage>) -> ValidationResult {
    let mut result = ValidationResult::new();
    match options {
        StepOptions::Resize(o) => validate_resize(o, image, &mut result),
        StepOptions::Crop(o) => validate_crop(o, image, &mut result),
        StepOptions::Optimize(o) => validate_optimize(o, image, &mut result),
        StepOptions::Rename(o) => validate_rename(o, &mut result),
        StepOptions::Favicon(o) => validate_favicon(o, image, &mut result),
        StepOptions::Template(o) => validate_template(o, &mut result),
    }
    result
}

fn validate_resize(o: &ResizeOptions, image: Option<&SubjectImage>, r: &mut ValidationResult) {
    if o.dimension <= 0 {
        r.push(
            ValidationMessage::error(
                codes::INVALID_DIMENSION,
                format!("Resize dimension must be positive, got {}", o.dimension),
            )
            .with_suggestion("Use a dimension of at least 10 pixels"),
        );
        return;
    }

    if o.dimension < MIN_USEFUL_DIMENSION {
        r.warning(
            codes::SMALL_DIMENSION,
            format!("Resize dimension {}px is very small", o.dimension),
        );
    }

    if let Some(max) = o.max_dimension
        && o.dimension > max
    {
        r.push(
            ValidationMessage::warning(
                codes::LARGE_DIMENSION,
                format!("Resize dimension {}px exceeds {}px", o.dimension, max),
            )
            .with_suggestion("Very large outputs are slow to encode and rarely needed"),
        );
    }

    if let Some(img) = image
        && o.dimension > img.longest_edge() as i64
        && !o.upscale
    {
        r.push(
            ValidationMessage::warning(
                codes::UPSCALE_REQUIRED,
                format!(
                    "Target {}px is larger than the {}x{} source but upscaling is disabled",
                    o.dimension, img.width, img.height
                ),
            )
            .with_suggestion("Enable upscale or choose a smaller dimension"),
        );
    }
}

fn validate_crop(o: &CropOptions, image: Option<&SubjectImage>, r: &mut ValidationResult) {
    if o.width <= 0 {
        r.error(
            codes::INVALID_WIDTH,
            format!("Crop width must be positive, got {}", o.width),
        );
    }
    if o.height <= 0 {
        r.error(
            codes::INVALID_HEIGHT,
            format!("Crop height must be positive, got {}", o.height),
        );
    }
    if !r.is_valid() {
        return;
    }

    if o.width < MIN_USEFUL_DIMENSION || o.height < MIN_USEFUL_DIMENSION {
        r.warning(
            codes::SMALL_CROP,
            format!("Crop {}x{} is very small", o.width, o.height),
        );
    }

    let aspect = o.width as f64 / o.height as f64;
    let (min_ar, max_ar) = ASPECT_RATIO_RANGE;
    if !(min_ar..=max_ar).contains(&aspect) {
        r.warning(
            codes::EXTREME_ASPECT_RATIO,
            format!("Crop aspect ratio {aspect:.2} is extreme"),
        );
    }

    if o.mode.is_ai() && o.confidence_threshold < MIN_AI_CONFIDENCE {
        r.push(
            ValidationMessage::warning(
                codes::LOW_CONFIDENCE_THRESHOLD,
                format!(
                    "Confidence threshold {} may accept false detections in {} mode",
                    o.confidence_threshold,
                    o.mode.as_str()
                ),
            )
            .with_suggestion("Use a threshold of 50 or more"),
        );
    }

    if let Some(img) = image
        && (o.width > img.width as i64 || o.height > img.height as i64)
        && !o.upscale
    {
        r.push(
            ValidationMessage::warning(
                codes::CROP_LARGER_THAN_SOURCE,
                format!(
                    "Crop {}x{} exceeds the {}x{} source and upscaling is disabled",
                    o.width, o.height, img.width, img.height
                ),
            )
            .with_suggestion("The crop will be limited to the source size"),
        );
    }
}

fn validate_optimize(o: &OptimizeOptions, image: Option<&SubjectImage>, r: &mut ValidationResult) {
    let quality_ok = (1..=100).contains(&o.quality);
    if !quality_ok {
        r.error(
            codes::INVALID_QUALITY,
            format!("Quality must be between 1 and 100, got {}", o.quality),
        );
    }

    let formats = o.format.formats();
    if formats.is_empty() {
        r.error(codes::UNSUPPORTED_FORMAT, "No output format given");
    }
    for format in &formats {
        if !OPTIMIZE_FORMATS.contains(&format.to_ascii_lowercase().as_str()) {
            r.push(
                ValidationMessage::error(
                    codes::UNSUPPORTED_FORMAT,
                    format!("Unsupported output format '{format}'"),
                )
                .with_suggestion(format!("Use one of: {}", OPTIMIZE_FORMATS.join(", "))),
            );
        }
    }

    if quality_ok && o.quality > 95 {
        r.warning(
            codes::HIGH_QUALITY,
            format!("Quality {} gives diminishing returns over 95", o.quality),
        );
    }
    if quality_ok && o.quality < 50 {
        r.warning(
            codes::LOW_QUALITY,
            format!("Quality {} may produce visible artifacts", o.quality),
        );
    }

    let targets_jpeg = formats.iter().any(|f| is_jpeg(f));
    if targets_jpeg && o.preserve_transparency {
        r.push(
            ValidationMessage::warning(
                codes::JPEG_TRANSPARENCY,
                "JPEG cannot store transparency",
            )
            .with_suggestion("Use png, webp or avif to keep the alpha channel"),
        );
    }

    if let Some(img) = image
        && img.has_transparency
        && targets_jpeg
    {
        r.warning(
            codes::TRANSPARENCY_LOST,
            "Source has transparency that JPEG output will flatten",
        );
    }

    let old_browsers = o
        .browser_support
        .iter()
        .any(|b| b == "legacy" || b == "all");
    if o.format.contains("avif") && old_browsers {
        r.push(
            ValidationMessage::warning(
                codes::AVIF_BROWSER_SUPPORT,
                "AVIF is not supported by legacy browsers",
            )
            .with_suggestion("Add a webp or jpg fallback format"),
        );
    }

    if o.compression_mode == CompressionMode::Aggressive && o.quality < 60 {
        r.warning(
            codes::AGGRESSIVE_LOW_QUALITY,
            format!(
                "Aggressive compression at quality {} compounds quality loss",
                o.quality
            ),
        );
    }
}

fn validate_rename(o: &RenameOptions, r: &mut ValidationResult) {
    if o.pattern.trim().is_empty() {
        r.push(
            ValidationMessage::error(codes::EMPTY_PATTERN, "Rename pattern is empty")
                .with_suggestion("Try {name}-{index}"),
        );
        return;
    }

    let mut bad: Vec<char> = o
        .pattern
        .chars()
        .filter(|c| FORBIDDEN_FILENAME_CHARS.contains(c) || c.is_ascii_control())
        .collect();
    bad.dedup();
    if !bad.is_empty() {
        let shown: Vec<String> = bad.iter().map(|c| format!("{c:?}")).collect();
        r.error(
            codes::INVALID_PATTERN_CHARS,
            format!(
                "Rename pattern contains invalid filename characters: {}",
                shown.join(" ")
            ),
        );
    }

    if !UNIQUE_PLACEHOLDERS.iter().any(|p| o.pattern.contains(p)) {
        r.push(
            ValidationMessage::warning(
                codes::MISSING_UNIQUE_PLACEHOLDER,
                "Pattern has no {name}, {index} or {timestamp}; output names may collide",
            )
            .with_suggestion("Include {index} to keep names unique"),
        );
    }
}

fn validate_favicon(o: &FaviconOptions, image: Option<&SubjectImage>, r: &mut ValidationResult) {
    if o.sizes.is_empty() {
        r.push(
            ValidationMessage::error(codes::NO_FAVICON_SIZES, "No favicon sizes requested")
                .with_suggestion("Sizes between 16 and 512 are kept"),
        );
        return;
    }

    for &size in &o.sizes {
        if size < FAVICON_RECOMMENDED_MIN {
            r.warning(
                codes::SMALL_FAVICON_SIZE,
                format!("Favicon size {size} is below the recommended 16px minimum"),
            );
        } else if size > FAVICON_UNUSUALLY_LARGE {
            r.warning(
                codes::LARGE_FAVICON_SIZE,
                format!("Favicon size {size} is unusually large"),
            );
        }
    }

    for format in &o.formats {
        if !FAVICON_FORMATS.contains(&format.to_ascii_lowercase().as_str()) {
            r.warning(
                codes::UNSUPPORTED_FAVICON_FORMAT,
                format!("Favicon format '{format}' is not supported and will be skipped"),
            );
        }
    }

    let Some(img) = image else {
        return;
    };
    if let Some(&smallest) = o.sizes.iter().min()
        && (img.shortest_edge() as i64) < smallest
    {
        r.push(
            ValidationMessage::warning(
                codes::SOURCE_TOO_SMALL,
                format!(
                    "Source {}x{} is smaller than the smallest favicon size {smallest}",
                    img.width, img.height
                ),
            )
            .with_suggestion("Use a source of at least 512x512"),
        );
    }
    if let Some(aspect) = img.aspect_ratio()
        && (aspect - 1.0).abs() > SQUARE_TOLERANCE
    {
        r.push(
            ValidationMessage::warning(
                codes::SOURCE_NOT_SQUARE,
                format!("Source {}x{} is not square", img.width, img.height),
            )
            .with_suggestion("Add a crop step with equal width and height first"),
        );
    }
}

fn validate_template(o: &TemplateOptions, r: &mut ValidationResult) {
    let missing = o
        .template_id
        .as_deref()
        .is_none_or(|id| id.trim().is_empty());
    if missing {
        r.error(codes::MISSING_TEMPLATE_ID, "Template step has no templateId");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{CropMode, FormatSelection};

    fn codes_of(r: &ValidationResult) -> Vec<&str> {
        r.messages().map(|m| m.code.as_str()).collect()
    }

    fn png(w: u32, h: u32) -> SubjectImage {
        SubjectImage::new(w, h, "image/png", true)
    }

    // =========================================================================
    // resize
    // =========================================================================

    #[test]
    fn resize_non_positive_is_error() {
        for d in [0, -1] {
            let o = ResizeOptions {
                dimension: d,
                ..Default::default()
            };
            let r = validate_step(&StepOptions::Resize(o), None);
            assert_eq!(codes_of(&r), vec![codes::INVALID_DIMENSION]);
            assert!(!r.is_valid());
        }
    }

    #[test]
    fn resize_small_and_large_warn() {
        let small = ResizeOptions {
            dimension: 8,
            ..Default::default()
        };
        let r = validate_step(&StepOptions::Resize(small), None);
        assert!(r.is_valid());
        assert!(r.has_code(codes::SMALL_DIMENSION));

        let large = ResizeOptions {
            dimension: 12_000,
            ..Default::default()
        };
        let r = validate_step(&StepOptions::Resize(large.clone()), None);
        assert!(r.has_code(codes::LARGE_DIMENSION));

        let unlimited = ResizeOptions {
            max_dimension: None,
            ..large
        };
        let r = validate_step(&StepOptions::Resize(unlimited), None);
        assert!(!r.has_code(codes::LARGE_DIMENSION));
    }

    #[test]
    fn resize_upscale_needs_image() {
        let o = StepOptions::Resize(ResizeOptions {
            dimension: 2000,
            ..Default::default()
        });
        assert!(!validate_step(&o, None).has_code(codes::UPSCALE_REQUIRED));
        assert!(validate_step(&o, Some(&png(800, 600))).has_code(codes::UPSCALE_REQUIRED));
        assert!(!validate_step(&o, Some(&png(2400, 600))).has_code(codes::UPSCALE_REQUIRED));
    }

    #[test]
    fn resize_upscale_allowed_is_silent() {
        let o = StepOptions::Resize(ResizeOptions {
            dimension: 2000,
            upscale: true,
            ..Default::default()
        });
        assert!(validate_step(&o, Some(&png(800, 600))).warnings.is_empty());
    }

    // =========================================================================
    // crop
    // =========================================================================

    #[test]
    fn crop_negative_width_is_width_error() {
        let o = CropOptions {
            width: -5,
            height: 500,
            ..Default::default()
        };
        let r = validate_step(&StepOptions::Crop(o), None);
        assert_eq!(r.errors.len(), 1);
        assert_eq!(r.errors[0].code, codes::INVALID_WIDTH);
    }

    #[test]
    fn crop_both_dimensions_invalid() {
        let o = CropOptions {
            width: 0,
            height: 0,
            ..Default::default()
        };
        let r = validate_step(&StepOptions::Crop(o), None);
        assert_eq!(
            codes_of(&r),
            vec![codes::INVALID_WIDTH, codes::INVALID_HEIGHT]
        );
    }

    #[test]
    fn crop_warnings() {
        let o = CropOptions {
            width: 5,
            height: 100,
            ..Default::default()
        };
        let r = validate_step(&StepOptions::Crop(o), None);
        assert!(r.is_valid());
        assert!(r.has_code(codes::SMALL_CROP));
        assert!(r.has_code(codes::EXTREME_ASPECT_RATIO));
    }

    #[test]
    fn crop_low_confidence_only_in_ai_mode() {
        let ai = CropOptions {
            mode: CropMode::Face,
            confidence_threshold: 30.0,
            ..Default::default()
        };
        assert!(validate_step(&StepOptions::Crop(ai.clone()), None)
            .has_code(codes::LOW_CONFIDENCE_THRESHOLD));

        let plain = CropOptions {
            mode: CropMode::Center,
            ..ai
        };
        assert!(!validate_step(&StepOptions::Crop(plain), None)
            .has_code(codes::LOW_CONFIDENCE_THRESHOLD));
    }

    #[test]
    fn crop_larger_than_source() {
        let o = StepOptions::Crop(CropOptions {
            width: 1000,
            height: 1000,
            ..Default::default()
        });
        assert!(validate_step(&o, Some(&png(800, 1200))).has_code(codes::CROP_LARGER_THAN_SOURCE));
        assert!(!validate_step(&o, Some(&png(1200, 1200))).has_code(codes::CROP_LARGER_THAN_SOURCE));
    }

    // =========================================================================
    // optimize
    // =========================================================================

    #[test]
    fn optimize_quality_bounds() {
        for q in [0, 101, -20] {
            let o = OptimizeOptions {
                quality: q,
                ..Default::default()
            };
            let r = validate_step(&StepOptions::Optimize(o), None);
            assert!(r.has_code(codes::INVALID_QUALITY), "quality {q}");
            assert!(!r.has_code(codes::LOW_QUALITY));
        }
    }

    #[test]
    fn optimize_quality_warnings() {
        let high = OptimizeOptions {
            quality: 98,
            ..Default::default()
        };
        assert!(validate_step(&StepOptions::Optimize(high), None).has_code(codes::HIGH_QUALITY));

        let low = OptimizeOptions {
            quality: 40,
            ..Default::default()
        };
        let r = validate_step(&StepOptions::Optimize(low), None);
        assert!(r.is_valid());
        assert!(r.has_code(codes::LOW_QUALITY));
    }

    #[test]
    fn optimize_unknown_format_is_error() {
        let o = OptimizeOptions {
            format: FormatSelection::Multiple(vec!["webp".into(), "bmp".into()]),
            ..Default::default()
        };
        let r = validate_step(&StepOptions::Optimize(o), None);
        assert_eq!(r.errors.len(), 1);
        assert_eq!(r.errors[0].code, codes::UNSUPPORTED_FORMAT);
        assert!(r.errors[0].message.contains("bmp"));
    }

    #[test]
    fn optimize_jpeg_transparency() {
        let o = OptimizeOptions {
            format: FormatSelection::Single("jpg".into()),
            preserve_transparency: true,
            ..Default::default()
        };
        let r = validate_step(&StepOptions::Optimize(o.clone()), Some(&png(100, 100)));
        assert!(r.has_code(codes::JPEG_TRANSPARENCY));
        assert!(r.has_code(codes::TRANSPARENCY_LOST));

        let opaque = SubjectImage::new(100, 100, "image/jpeg", false);
        let r = validate_step(&StepOptions::Optimize(o), Some(&opaque));
        assert!(!r.has_code(codes::TRANSPARENCY_LOST));
    }

    #[test]
    fn optimize_avif_legacy_browsers() {
        let o = OptimizeOptions {
            format: FormatSelection::Single("avif".into()),
            quality: 60,
            ..Default::default()
        };
        assert!(validate_step(&StepOptions::Optimize(o.clone()), None)
            .has_code(codes::AVIF_BROWSER_SUPPORT));

        let modern = OptimizeOptions {
            browser_support: vec!["modern".into()],
            ..o
        };
        assert!(!validate_step(&StepOptions::Optimize(modern), None)
            .has_code(codes::AVIF_BROWSER_SUPPORT));
    }

    #[test]
    fn optimize_aggressive_low_quality() {
        let o = OptimizeOptions {
            quality: 55,
            compression_mode: CompressionMode::Aggressive,
            ..Default::default()
        };
        assert!(validate_step(&StepOptions::Optimize(o), None)
            .has_code(codes::AGGRESSIVE_LOW_QUALITY));
    }

    // =========================================================================
    // rename
    // =========================================================================

    fn rename(pattern: &str) -> ValidationResult {
        validate_step(
            &StepOptions::Rename(RenameOptions {
                pattern: pattern.to_string(),
                ..Default::default()
            }),
            None,
        )
    }

    #[test]
    fn rename_blank_pattern_is_error() {
        assert_eq!(codes_of(&rename("   ")), vec![codes::EMPTY_PATTERN]);
    }

    #[test]
    fn rename_forbidden_characters() {
        let r = rename("{name}:{index}?");
        assert!(r.has_code(codes::INVALID_PATTERN_CHARS));
        assert!(rename("{name}\u{7}").has_code(codes::INVALID_PATTERN_CHARS));
        assert!(rename("{name}-{index}").is_valid());
    }

    #[test]
    fn rename_without_unique_placeholder_warns() {
        let r = rename("{width}x{height}");
        assert!(r.is_valid());
        assert!(r.has_code(codes::MISSING_UNIQUE_PLACEHOLDER));
        assert!(!rename("photo-{index}").has_code(codes::MISSING_UNIQUE_PLACEHOLDER));
    }

    // =========================================================================
    // favicon
    // =========================================================================

    #[test]
    fn favicon_without_sizes_is_error() {
        let o = FaviconOptions {
            sizes: vec![],
            ..Default::default()
        };
        let r = validate_step(&StepOptions::Favicon(o), None);
        assert_eq!(codes_of(&r), vec![codes::NO_FAVICON_SIZES]);
    }

    #[test]
    fn favicon_size_and_format_warnings() {
        let o = FaviconOptions {
            sizes: vec![8, 32, 2048],
            formats: vec!["png".into(), "gif".into()],
            ..Default::default()
        };
        let r = validate_step(&StepOptions::Favicon(o), None);
        assert!(r.is_valid());
        assert_eq!(
            codes_of(&r),
            vec![
                codes::SMALL_FAVICON_SIZE,
                codes::LARGE_FAVICON_SIZE,
                codes::UNSUPPORTED_FAVICON_FORMAT
            ]
        );
    }

    #[test]
    fn favicon_source_checks_need_image() {
        let o = StepOptions::Favicon(FaviconOptions {
            sizes: vec![64, 256],
            ..Default::default()
        });
        assert!(validate_step(&o, None).warnings.is_empty());

        let r = validate_step(&o, Some(&png(48, 100)));
        assert!(r.has_code(codes::SOURCE_TOO_SMALL));
        assert!(r.has_code(codes::SOURCE_NOT_SQUARE));

        let r = validate_step(&o, Some(&png(512, 540)));
        assert!(r.warnings.is_empty(), "{:?}", r.warnings);
    }

    // =========================================================================
    // template
    // =========================================================================

    #[test]
    fn template_requires_id() {
        let r = validate_step(&StepOptions::Template(TemplateOptions::default()), None);
        assert_eq!(codes_of(&r), vec![codes::MISSING_TEMPLATE_ID]);

        let blank = TemplateOptions {
            template_id: Some("  ".into()),
        };
        assert!(!validate_step(&StepOptions::Template(blank), None).is_valid());

        let ok = TemplateOptions {
            template_id: Some("instagram-square".into()),
        };
        assert!(validate_step(&StepOptions::Template(ok), None).is_valid());
    }
}
