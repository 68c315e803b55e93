//! Validation results shared by every validator.
//!
//! A [`ValidationResult`] is an accumulator of [`ValidationMessage`]s split
//! into blocking errors and advisory warnings. Only errors affect validity.
//! Every message carries a stable machine-readable `code` (see [`codes`]);
//! the `step` field is filled in by the task, never by the step validator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How serious a message is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        })
    }
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationMessage {
    /// Stable code, e.g. `invalid_width`.
    pub code: String,
    pub message: String,
    pub severity: Severity,
    /// 1-based `order` of the step the message is about.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationMessage {
    fn new(code: &str, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            severity,
            step: None,
            suggestion: None,
        }
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::new(code, message, Severity::Error)
    }

    pub fn warning(code: &str, message: impl Into<String>) -> Self {
        Self::new(code, message, Severity::Warning)
    }

    pub fn info(code: &str, message: impl Into<String>) -> Self {
        Self::new(code, message, Severity::Info)
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn at_step(mut self, order: usize) -> Self {
        self.step = Some(order);
        self
    }
}

/// Errors block execution; warnings never do.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    #[serde(default)]
    pub errors: Vec<ValidationMessage>,
    #[serde(default)]
    pub warnings: Vec<ValidationMessage>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Route a message by its severity.
    pub fn push(&mut self, message: ValidationMessage) {
        match message.severity {
            Severity::Error => self.errors.push(message),
            Severity::Warning | Severity::Info => self.warnings.push(message),
        }
    }

    pub fn error(&mut self, code: &str, message: impl Into<String>) {
        self.push(ValidationMessage::error(code, message));
    }

    pub fn warning(&mut self, code: &str, message: impl Into<String>) {
        self.push(ValidationMessage::warning(code, message));
    }

    pub fn info(&mut self, code: &str, message: impl Into<String>) {
        self.push(ValidationMessage::info(code, message));
    }

    /// Append everything from `other`, tagging untagged messages with `step`.
    pub fn absorb(&mut self, other: ValidationResult, step: Option<usize>) {
        let tag = |mut m: ValidationMessage| {
            if m.step.is_none() {
                m.step = step;
            }
            m
        };
        self.errors.extend(other.errors.into_iter().map(tag));
        self.warnings.extend(other.warnings.into_iter().map(tag));
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.messages().any(|m| m.code == code)
    }

    /// Errors first, then warnings, each in insertion order.
    pub fn messages(&self) -> impl Iterator<Item = &ValidationMessage> {
        self.errors.iter().chain(self.warnings.iter())
    }

    pub fn info_count(&self) -> usize {
        self.warnings
            .iter()
            .filter(|w| w.severity == Severity::Info)
            .count()
    }
}

/// Stable message codes.
pub mod codes {
    // resize
    pub const INVALID_DIMENSION: &str = "invalid_dimension";
    pub const SMALL_DIMENSION: &str = "small_dimension";
    pub const LARGE_DIMENSION: &str = "large_dimension";
    pub const UPSCALE_REQUIRED: &str = "upscale_required";

    // crop
    pub const INVALID_WIDTH: &str = "invalid_width";
    pub const INVALID_HEIGHT: &str = "invalid_height";
    pub const SMALL_CROP: &str = "small_crop";
    pub const EXTREME_ASPECT_RATIO: &str = "extreme_aspect_ratio";
    pub const LOW_CONFIDENCE_THRESHOLD: &str = "low_confidence_threshold";
    pub const CROP_LARGER_THAN_SOURCE: &str = "crop_larger_than_source";
    pub const AI_CAPABILITY_UNAVAILABLE: &str = "ai_capability_unavailable";

    // optimize
    pub const INVALID_QUALITY: &str = "invalid_quality";
    pub const UNSUPPORTED_FORMAT: &str = "unsupported_format";
    pub const HIGH_QUALITY: &str = "high_quality";
    pub const LOW_QUALITY: &str = "low_quality";
    pub const JPEG_TRANSPARENCY: &str = "jpeg_transparency";
    pub const TRANSPARENCY_LOST: &str = "transparency_lost";
    pub const AVIF_BROWSER_SUPPORT: &str = "avif_browser_support";
    pub const AGGRESSIVE_LOW_QUALITY: &str = "aggressive_low_quality";

    // rename
    pub const EMPTY_PATTERN: &str = "empty_pattern";
    pub const INVALID_PATTERN_CHARS: &str = "invalid_pattern_chars";
    pub const MISSING_UNIQUE_PLACEHOLDER: &str = "missing_unique_placeholder";

    // favicon
    pub const NO_FAVICON_SIZES: &str = "no_favicon_sizes";
    pub const SMALL_FAVICON_SIZE: &str = "small_favicon_size";
    pub const LARGE_FAVICON_SIZE: &str = "large_favicon_size";
    pub const UNSUPPORTED_FAVICON_FORMAT: &str = "unsupported_favicon_format";
    pub const SOURCE_TOO_SMALL: &str = "source_too_small";
    pub const SOURCE_NOT_SQUARE: &str = "source_not_square";

    // template
    pub const MISSING_TEMPLATE_ID: &str = "missing_template_id";

    // task logic
    pub const EMPTY_TASK: &str = "empty_task";
    pub const CROP_WITHOUT_RESIZE: &str = "crop_without_resize";
    pub const MULTIPLE_OPTIMIZE: &str = "multiple_optimize";
    pub const RENAME_NOT_LAST: &str = "rename_not_last";
    pub const FAVICON_WITHOUT_PREPARATION: &str = "favicon_without_preparation";
    pub const OPTIMIZE_AFTER_FAVICON: &str = "optimize_after_favicon";
    pub const OPTIMIZATION_ONLY: &str = "optimization_only";
}
