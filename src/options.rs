//! Typed step options and their resolution.
//!
//! Every step kind has one options struct with named, typed fields. Callers
//! hand in loose JSON (`{"width": 800}`); [`OptionResolver`] turns that into
//! a fully populated struct in three layers:
//!
//! ```text
//! built-in defaults  →  configured defaults ([defaults.<kind>])  →  caller options
//! ```
//!
//! Merging is shallow and key by key: a caller key replaces the default
//! outright, an absent key falls through. A caller key whose value does not
//! fit the field's type (or that names no field at all) is dropped and the
//! default kept, so resolution always succeeds.
//!
//! After merging, each kind runs its normalization rules (see
//! [`KindOptions::normalize`]). Normalization is a fixed point: resolving an
//! already-resolved options bag changes nothing.

use crate::processors::ProcessorKind;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Placeholders that make a rename pattern usable.
pub const RENAME_PLACEHOLDERS: &[&str] = &[
    "{name}",
    "{index}",
    "{timestamp}",
    "{width}",
    "{height}",
    "{dimensions}",
];

pub const DEFAULT_RENAME_PATTERN: &str = "{name}-{index}";

/// Favicon sizes outside this range are discarded during resolution.
pub const FAVICON_SIZE_RANGE: (i64, i64) = (16, 512);

/// AVIF encoders treat anything above this as near-lossless.
pub const AVIF_MAX_QUALITY: i64 = 63;

pub const BROWSER_SUPPORT_VALUES: &[&str] = &["modern", "legacy", "all"];

// ============================================================================
// Per-kind option structs
// ============================================================================

/// Which edge `dimension` applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMode {
    #[default]
    Longest,
    Width,
    Height,
}

impl ResizeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Longest => "longest",
            Self::Width => "width",
            Self::Height => "height",
        }
    }
}

/// Resampling filter handed to the raster backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeAlgorithm {
    #[default]
    Lanczos3,
    Cubic,
    Linear,
    Gaussian,
    Nearest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ResizeOptions {
    /// Target length in pixels of the edge selected by `mode`.
    pub dimension: i64,
    pub mode: ResizeMode,
    pub algorithm: ResizeAlgorithm,
    /// Allow output larger than the source.
    pub upscale: bool,
    /// Pad to a square canvas after resizing.
    pub force_square: bool,
    /// Dimensions above this draw a warning. `null` disables the check.
    pub max_dimension: Option<i64>,
}

impl Default for ResizeOptions {
    fn default() -> Self {
        Self {
            dimension: 1024,
            mode: ResizeMode::Longest,
            algorithm: ResizeAlgorithm::Lanczos3,
            upscale: false,
            force_square: false,
            max_dimension: Some(10_000),
        }
    }
}

/// Where a crop window is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CropMode {
    #[default]
    Center,
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Smart,
    Face,
    Object,
    Saliency,
    Entropy,
}

impl CropMode {
    /// Modes that depend on subject detection.
    pub fn is_ai(self) -> bool {
        matches!(
            self,
            Self::Smart | Self::Face | Self::Object | Self::Saliency | Self::Entropy
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Center => "center",
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Left => "left",
            Self::Right => "right",
            Self::TopLeft => "top-left",
            Self::TopRight => "top-right",
            Self::BottomLeft => "bottom-left",
            Self::BottomRight => "bottom-right",
            Self::Smart => "smart",
            Self::Face => "face",
            Self::Object => "object",
            Self::Saliency => "saliency",
            Self::Entropy => "entropy",
        }
    }
}

pub fn default_objects_to_detect() -> Vec<String> {
    ["person", "face", "animal", "product"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct CropOptions {
    pub width: i64,
    pub height: i64,
    pub mode: CropMode,
    pub upscale: bool,
    /// Minimum detection confidence (0-100) for AI modes.
    pub confidence_threshold: f64,
    pub objects_to_detect: Vec<String>,
}

impl Default for CropOptions {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1080,
            mode: CropMode::Center,
            upscale: false,
            confidence_threshold: 70.0,
            objects_to_detect: default_objects_to_detect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMode {
    #[default]
    Adaptive,
    Aggressive,
    Balanced,
}

/// One output format or several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormatSelection {
    Single(String),
    Multiple(Vec<String>),
}

impl FormatSelection {
    pub fn formats(&self) -> Vec<&str> {
        match self {
            Self::Single(f) => vec![f.as_str()],
            Self::Multiple(fs) => fs.iter().map(String::as_str).collect(),
        }
    }

    /// The format when exactly one was given as a plain string.
    pub fn single(&self) -> Option<&str> {
        match self {
            Self::Single(f) => Some(f),
            Self::Multiple(_) => None,
        }
    }

    pub fn contains(&self, format: &str) -> bool {
        self.formats().iter().any(|f| f.eq_ignore_ascii_case(format))
    }
}

impl Default for FormatSelection {
    fn default() -> Self {
        Self::Single("auto".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct OptimizeOptions {
    pub quality: i64,
    pub format: FormatSelection,
    pub preserve_transparency: bool,
    pub browser_support: Vec<String>,
    pub compression_mode: CompressionMode,
    /// Inspect image content to pick encoder settings (slower).
    pub analyze_content: bool,
    pub strip_metadata: bool,
    pub lossless: bool,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            quality: 85,
            format: FormatSelection::default(),
            preserve_transparency: false,
            browser_support: default_browser_support(),
            compression_mode: CompressionMode::Adaptive,
            analyze_content: false,
            strip_metadata: true,
            lossless: false,
        }
    }
}

fn default_browser_support() -> Vec<String> {
    vec!["modern".to_string(), "legacy".to_string()]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct RenameOptions {
    pub pattern: String,
    /// Value of `{index}` for the first image.
    pub start_index: i64,
    /// Left-pad `{index}` with zeros to this width.
    pub zero_pad: u32,
    pub lowercase: bool,
}

impl Default for RenameOptions {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_RENAME_PATTERN.to_string(),
            start_index: 1,
            zero_pad: 0,
            lowercase: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct FaviconOptions {
    pub sizes: Vec<i64>,
    pub formats: Vec<String>,
    pub generate_manifest: bool,
    pub generate_html: bool,
    pub include_apple_touch: bool,
    pub include_android: bool,
    pub app_name: String,
    pub theme_color: String,
    pub background_color: String,
}

impl Default for FaviconOptions {
    fn default() -> Self {
        Self {
            sizes: vec![16, 32, 48, 64, 128, 256],
            formats: vec!["png".to_string(), "ico".to_string()],
            generate_manifest: true,
            generate_html: false,
            include_apple_touch: false,
            include_android: false,
            app_name: "App".to_string(),
            theme_color: "#ffffff".to_string(),
            background_color: "#ffffff".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct TemplateOptions {
    pub template_id: Option<String>,
}

// ============================================================================
// Closed union
// ============================================================================

/// Resolved options for one step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOptions {
    Resize(ResizeOptions),
    Crop(CropOptions),
    Optimize(OptimizeOptions),
    Rename(RenameOptions),
    Template(TemplateOptions),
    Favicon(FaviconOptions),
}

impl StepOptions {
    pub fn kind(&self) -> ProcessorKind {
        match self {
            Self::Resize(_) => ProcessorKind::Resize,
            Self::Crop(_) => ProcessorKind::Crop,
            Self::Optimize(_) => ProcessorKind::Optimize,
            Self::Rename(_) => ProcessorKind::Rename,
            Self::Template(_) => ProcessorKind::Template,
            Self::Favicon(_) => ProcessorKind::Favicon,
        }
    }

    /// Plain JSON object of the options (no kind tag).
    pub fn to_value(&self) -> Value {
        let value = match self {
            Self::Resize(o) => serde_json::to_value(o),
            Self::Crop(o) => serde_json::to_value(o),
            Self::Optimize(o) => serde_json::to_value(o),
            Self::Rename(o) => serde_json::to_value(o),
            Self::Template(o) => serde_json::to_value(o),
            Self::Favicon(o) => serde_json::to_value(o),
        };
        value.unwrap_or_else(|_| Value::Object(Map::new()))
    }

    pub fn default_for(kind: ProcessorKind) -> Self {
        match kind {
            ProcessorKind::Resize => Self::Resize(ResizeOptions::default()),
            ProcessorKind::Crop => Self::Crop(CropOptions::default()),
            ProcessorKind::Optimize => Self::Optimize(OptimizeOptions::default()),
            ProcessorKind::Rename => Self::Rename(RenameOptions::default()),
            ProcessorKind::Template => Self::Template(TemplateOptions::default()),
            ProcessorKind::Favicon => Self::Favicon(FaviconOptions::default()),
        }
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Behaviour shared by every options struct.
pub trait KindOptions: Serialize + DeserializeOwned + Default + Clone {
    const KIND: ProcessorKind;

    /// Kind-specific corrections applied after merging. `raw` is the
    /// caller-supplied bag, for rules that look at what was actually asked.
    fn normalize(&mut self, _raw: &Map<String, Value>) {}

    fn into_step_options(self) -> StepOptions;
}

impl KindOptions for ResizeOptions {
    const KIND: ProcessorKind = ProcessorKind::Resize;

    fn into_step_options(self) -> StepOptions {
        StepOptions::Resize(self)
    }
}

impl KindOptions for CropOptions {
    const KIND: ProcessorKind = ProcessorKind::Crop;

    fn normalize(&mut self, raw: &Map<String, Value>) {
        if raw
            .get("objectsToDetect")
            .is_some_and(|v| Vec::<String>::deserialize(v).is_err())
        {
            self.objects_to_detect = default_objects_to_detect();
        }
        if self.mode.is_ai() {
            self.confidence_threshold = if self.confidence_threshold.is_finite() {
                self.confidence_threshold.clamp(0.0, 100.0)
            } else {
                70.0
            };
        }
    }

    fn into_step_options(self) -> StepOptions {
        StepOptions::Crop(self)
    }
}

impl KindOptions for OptimizeOptions {
    const KIND: ProcessorKind = ProcessorKind::Optimize;

    fn normalize(&mut self, raw: &Map<String, Value>) {
        if raw.get("preserveTransparency").is_some_and(is_truthy) {
            self.preserve_transparency = true;
        }
        if self.preserve_transparency && self.format.single().is_some_and(is_jpeg) {
            self.format = FormatSelection::Single("png".to_string());
        }

        if raw
            .get("compressionMode")
            .is_some_and(|v| CompressionMode::deserialize(v).is_err())
        {
            self.compression_mode = CompressionMode::Adaptive;
        }

        self.browser_support
            .retain(|b| BROWSER_SUPPORT_VALUES.contains(&b.as_str()));
        if self.browser_support.is_empty() {
            self.browser_support = default_browser_support();
        }

        if self.format.single() == Some("avif") {
            self.quality = self.quality.min(AVIF_MAX_QUALITY);
        }
    }

    fn into_step_options(self) -> StepOptions {
        StepOptions::Optimize(self)
    }
}

impl KindOptions for RenameOptions {
    const KIND: ProcessorKind = ProcessorKind::Rename;

    fn normalize(&mut self, _raw: &Map<String, Value>) {
        if !RENAME_PLACEHOLDERS.iter().any(|p| self.pattern.contains(p)) {
            self.pattern = DEFAULT_RENAME_PATTERN.to_string();
        }
    }

    fn into_step_options(self) -> StepOptions {
        StepOptions::Rename(self)
    }
}

impl KindOptions for TemplateOptions {
    const KIND: ProcessorKind = ProcessorKind::Template;

    fn into_step_options(self) -> StepOptions {
        StepOptions::Template(self)
    }
}

impl KindOptions for FaviconOptions {
    const KIND: ProcessorKind = ProcessorKind::Favicon;

    fn normalize(&mut self, _raw: &Map<String, Value>) {
        let (min, max) = FAVICON_SIZE_RANGE;
        self.sizes.sort_unstable();
        self.sizes.dedup();
        self.sizes.retain(|s| (min..=max).contains(s));
    }

    fn into_step_options(self) -> StepOptions {
        StepOptions::Favicon(self)
    }
}

pub fn is_jpeg(format: &str) -> bool {
    format.eq_ignore_ascii_case("jpg") || format.eq_ignore_ascii_case("jpeg")
}

/// Loose truthiness for caller-supplied flags (`true`, `1`, `"yes"`).
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn as_object(value: &Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    }
}

/// Merge `overlay` onto `base` one key at a time, keeping only keys whose
/// value deserializes into `T`. Returns the accepted merged map.
fn merge_lenient<T: KindOptions>(
    mut base: Map<String, Value>,
    overlay: &Map<String, Value>,
) -> Map<String, Value> {
    for (key, value) in overlay {
        let mut candidate = base.clone();
        candidate.insert(key.clone(), value.clone());
        match serde_json::from_value::<T>(Value::Object(candidate)) {
            Ok(_) => {
                base.insert(key.clone(), value.clone());
            }
            Err(e) => {
                let kind = T::KIND;
                tracing::debug!(%kind, %key, error = %e, "dropping option");
            }
        }
    }
    base
}

fn stock_defaults<T: KindOptions>() -> Map<String, Value> {
    serde_json::to_value(T::default())
        .map(|v| as_object(&v))
        .unwrap_or_default()
}

/// Resolves raw caller options into [`StepOptions`].
///
/// The default resolver uses built-in defaults only; configured defaults are
/// layered in with [`OptionResolver::with_defaults`].
#[derive(Debug, Clone, Default)]
pub struct OptionResolver {
    configured: BTreeMap<ProcessorKind, Map<String, Value>>,
}

impl OptionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer configured defaults for `kind` between built-ins and callers.
    pub fn with_defaults(mut self, kind: ProcessorKind, defaults: Map<String, Value>) -> Self {
        if !defaults.is_empty() {
            self.configured.insert(kind, defaults);
        }
        self
    }

    pub fn resolve(&self, kind: ProcessorKind, raw: &Value) -> StepOptions {
        match kind {
            ProcessorKind::Resize => self.resolve_kind::<ResizeOptions>(raw),
            ProcessorKind::Crop => self.resolve_kind::<CropOptions>(raw),
            ProcessorKind::Optimize => self.resolve_kind::<OptimizeOptions>(raw),
            ProcessorKind::Rename => self.resolve_kind::<RenameOptions>(raw),
            ProcessorKind::Template => self.resolve_kind::<TemplateOptions>(raw),
            ProcessorKind::Favicon => self.resolve_kind::<FaviconOptions>(raw),
        }
    }

    /// Re-resolve already typed options (used on import and for sugar methods).
    pub fn resolve_options(&self, options: &StepOptions) -> StepOptions {
        self.resolve(options.kind(), &options.to_value())
    }

    fn resolve_kind<T: KindOptions>(&self, raw: &Value) -> StepOptions {
        let raw = as_object(raw);
        let mut base = stock_defaults::<T>();
        if let Some(configured) = self.configured.get(&T::KIND) {
            base = merge_lenient::<T>(base, configured);
        }
        let merged = merge_lenient::<T>(base, &raw);
        let mut options: T = serde_json::from_value(Value::Object(merged)).unwrap_or_default();
        options.normalize(&raw);
        options.into_step_options()
    }
}

/// Resolve with built-in defaults only.
pub fn resolve(kind: ProcessorKind, raw: &Value) -> StepOptions {
    OptionResolver::default().resolve(kind, raw)
}

/// Strictly check a defaults table: every key must name a field of the
/// kind's options and have the right type.
pub fn check_defaults(kind: ProcessorKind, defaults: &Map<String, Value>) -> Result<(), String> {
    fn check<T: KindOptions>(defaults: &Map<String, Value>) -> Result<(), String> {
        let mut merged = stock_defaults::<T>();
        merged.extend(defaults.clone());
        serde_json::from_value::<T>(Value::Object(merged))
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
    match kind {
        ProcessorKind::Resize => check::<ResizeOptions>(defaults),
        ProcessorKind::Crop => check::<CropOptions>(defaults),
        ProcessorKind::Optimize => check::<OptimizeOptions>(defaults),
        ProcessorKind::Rename => check::<RenameOptions>(defaults),
        ProcessorKind::Template => check::<TemplateOptions>(defaults),
        ProcessorKind::Favicon => check::<FaviconOptions>(defaults),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn favicon(raw: Value) -> FaviconOptions {
        match resolve(ProcessorKind::Favicon, &raw) {
            StepOptions::Favicon(o) => o,
            other => panic!("expected favicon options, got {other:?}"),
        }
    }

    fn optimize(raw: Value) -> OptimizeOptions {
        match resolve(ProcessorKind::Optimize, &raw) {
            StepOptions::Optimize(o) => o,
            other => panic!("expected optimize options, got {other:?}"),
        }
    }

    fn crop(raw: Value) -> CropOptions {
        match resolve(ProcessorKind::Crop, &raw) {
            StepOptions::Crop(o) => o,
            other => panic!("expected crop options, got {other:?}"),
        }
    }

    fn rename(raw: Value) -> RenameOptions {
        match resolve(ProcessorKind::Rename, &raw) {
            StepOptions::Rename(o) => o,
            other => panic!("expected rename options, got {other:?}"),
        }
    }

    #[test]
    fn absent_keys_fall_through_to_defaults() {
        let StepOptions::Resize(o) = resolve(ProcessorKind::Resize, &json!({"dimension": 640}))
        else {
            panic!("wrong kind")
        };
        assert_eq!(o.dimension, 640);
        assert_eq!(o.mode, ResizeMode::Longest);
        assert_eq!(o.max_dimension, Some(10_000));
    }

    #[test]
    fn non_object_raw_means_all_defaults() {
        assert_eq!(
            resolve(ProcessorKind::Crop, &Value::Null),
            StepOptions::Crop(CropOptions::default())
        );
    }

    #[test]
    fn mistyped_and_unknown_keys_are_dropped() {
        let o = crop(json!({"width": "wide", "height": 300, "colour": "red"}));
        assert_eq!(o.width, 1080);
        assert_eq!(o.height, 300);
    }

    #[test]
    fn explicit_null_disables_max_dimension() {
        let StepOptions::Resize(o) =
            resolve(ProcessorKind::Resize, &json!({"maxDimension": null}))
        else {
            panic!("wrong kind")
        };
        assert_eq!(o.max_dimension, None);
    }

    #[test]
    fn favicon_sizes_dedup_sort_filter() {
        let o = favicon(json!({"sizes": [32, 16, 16, 9999, 8]}));
        assert_eq!(o.sizes, vec![16, 32]);
    }

    #[test]
    fn favicon_sizes_keep_bounds_inclusive() {
        let o = favicon(json!({"sizes": [512, 16, 513, 15]}));
        assert_eq!(o.sizes, vec![16, 512]);
    }

    #[test]
    fn avif_quality_is_clamped() {
        for q in [1, 50, 63, 64, 90, 100] {
            let o = optimize(json!({"format": "avif", "quality": q}));
            assert!(o.quality <= AVIF_MAX_QUALITY, "quality {q} → {}", o.quality);
            assert_eq!(o.quality, q.min(63));
        }
    }

    #[test]
    fn jpeg_with_transparency_becomes_png() {
        let o = optimize(json!({"format": "jpg", "preserveTransparency": true}));
        assert_eq!(o.format, FormatSelection::Single("png".into()));
    }

    #[test]
    fn jpeg_without_transparency_request_stays_jpeg() {
        let o = optimize(json!({"format": "jpg"}));
        assert_eq!(o.format, FormatSelection::Single("jpg".into()));
    }

    #[test]
    fn browser_support_filtered_then_defaulted() {
        let o = optimize(json!({"browserSupport": ["modern", "ie6"]}));
        assert_eq!(o.browser_support, vec!["modern"]);

        let o = optimize(json!({"browserSupport": ["ie6"]}));
        assert_eq!(o.browser_support, vec!["modern", "legacy"]);
    }

    #[test]
    fn unknown_compression_mode_defaults_to_adaptive() {
        let o = optimize(json!({"compressionMode": "extreme"}));
        assert_eq!(o.compression_mode, CompressionMode::Adaptive);
        let o = optimize(json!({"compressionMode": "aggressive"}));
        assert_eq!(o.compression_mode, CompressionMode::Aggressive);
    }

    #[test]
    fn format_list_is_accepted() {
        let o = optimize(json!({"format": ["webp", "avif"]}));
        assert_eq!(o.format.formats(), vec!["webp", "avif"]);
        assert_eq!(o.format.single(), None);
    }

    #[test]
    fn ai_crop_threshold_clamped() {
        let o = crop(json!({"mode": "face", "confidenceThreshold": 150}));
        assert_eq!(o.confidence_threshold, 100.0);
        let o = crop(json!({"mode": "smart", "confidenceThreshold": -3}));
        assert_eq!(o.confidence_threshold, 0.0);
    }

    #[test]
    fn non_ai_crop_threshold_untouched() {
        let o = crop(json!({"mode": "center", "confidenceThreshold": 150}));
        assert_eq!(o.confidence_threshold, 150.0);
    }

    #[test]
    fn objects_to_detect_must_be_a_list() {
        let o = crop(json!({"mode": "object", "objectsToDetect": "cats"}));
        assert_eq!(o.objects_to_detect, default_objects_to_detect());
    }

    #[test]
    fn rename_pattern_without_placeholder_self_heals() {
        assert_eq!(rename(json!({"pattern": "static-name"})).pattern, "{name}-{index}");
        assert_eq!(rename(json!({"pattern": ""})).pattern, "{name}-{index}");
        assert_eq!(rename(json!({"pattern": "{width}w"})).pattern, "{width}w");
    }

    #[test]
    fn resolution_is_a_fixed_point() {
        let cases = [
            (ProcessorKind::Resize, json!({"dimension": -3, "mode": "width"})),
            (ProcessorKind::Crop, json!({"mode": "saliency", "confidenceThreshold": 400})),
            (
                ProcessorKind::Optimize,
                json!({"format": "jpg", "preserveTransparency": 1, "browserSupport": []}),
            ),
            (ProcessorKind::Optimize, json!({"format": "avif", "quality": 99})),
            (ProcessorKind::Rename, json!({"pattern": "x"})),
            (ProcessorKind::Template, json!({"templateId": "instagram-square"})),
            (ProcessorKind::Favicon, json!({"sizes": [1024, 48, 16, 48]})),
        ];
        for (kind, raw) in cases {
            let once = resolve(kind, &raw);
            let twice = OptionResolver::default().resolve_options(&once);
            assert_eq!(once, twice, "{kind} not idempotent");
        }
    }

    #[test]
    fn configured_defaults_sit_between_builtin_and_caller() {
        let mut configured = Map::new();
        configured.insert("quality".into(), json!(70));
        configured.insert("format".into(), json!("webp"));
        let resolver = OptionResolver::new().with_defaults(ProcessorKind::Optimize, configured);

        let StepOptions::Optimize(o) = resolver.resolve(ProcessorKind::Optimize, &json!({}))
        else {
            panic!("wrong kind")
        };
        assert_eq!(o.quality, 70);
        assert_eq!(o.format.single(), Some("webp"));

        let StepOptions::Optimize(o) =
            resolver.resolve(ProcessorKind::Optimize, &json!({"quality": 40}))
        else {
            panic!("wrong kind")
        };
        assert_eq!(o.quality, 40);
    }

    fn configured(kind: ProcessorKind, defaults: Value) -> OptionResolver {
        OptionResolver::new().with_defaults(kind, as_object(&defaults))
    }

    #[test]
    fn configured_transparency_applies_on_first_resolution() {
        let resolver = configured(
            ProcessorKind::Optimize,
            json!({"preserveTransparency": true}),
        );
        let once = resolver.resolve(ProcessorKind::Optimize, &json!({"format": "jpg"}));
        let twice = resolver.resolve_options(&once);
        assert_eq!(once, twice);

        let StepOptions::Optimize(o) = once else {
            panic!("wrong kind")
        };
        assert_eq!(o.format, FormatSelection::Single("png".into()));
        assert!(o.preserve_transparency);
    }

    #[test]
    fn loosely_truthy_transparency_is_kept_on_the_options() {
        let o = optimize(json!({"format": "jpg", "preserveTransparency": "yes"}));
        assert!(o.preserve_transparency);
        assert_eq!(o.format, FormatSelection::Single("png".into()));
    }

    #[test]
    fn bad_compression_mode_ignores_configured_value() {
        let resolver = configured(
            ProcessorKind::Optimize,
            json!({"compressionMode": "aggressive"}),
        );
        let StepOptions::Optimize(o) =
            resolver.resolve(ProcessorKind::Optimize, &json!({"compressionMode": "extreme"}))
        else {
            panic!("wrong kind")
        };
        assert_eq!(o.compression_mode, CompressionMode::Adaptive);

        let StepOptions::Optimize(o) = resolver.resolve(ProcessorKind::Optimize, &json!({}))
        else {
            panic!("wrong kind")
        };
        assert_eq!(o.compression_mode, CompressionMode::Aggressive);
    }

    #[test]
    fn non_list_objects_ignore_configured_value() {
        let resolver = configured(ProcessorKind::Crop, json!({"objectsToDetect": ["cat"]}));
        let StepOptions::Crop(o) = resolver.resolve(
            ProcessorKind::Crop,
            &json!({"mode": "object", "objectsToDetect": "dogs"}),
        ) else {
            panic!("wrong kind")
        };
        assert_eq!(o.objects_to_detect, default_objects_to_detect());

        let StepOptions::Crop(o) = resolver.resolve(ProcessorKind::Crop, &json!({}))
        else {
            panic!("wrong kind")
        };
        assert_eq!(o.objects_to_detect, vec!["cat"]);
    }

    #[test]
    fn check_defaults_rejects_unknown_keys_and_bad_types() {
        let mut ok = Map::new();
        ok.insert("dimension".into(), json!(2048));
        assert!(check_defaults(ProcessorKind::Resize, &ok).is_ok());

        let mut unknown = Map::new();
        unknown.insert("dimensions".into(), json!(2048));
        assert!(check_defaults(ProcessorKind::Resize, &unknown).is_err());

        let mut bad = Map::new();
        bad.insert("upscale".into(), json!("sometimes"));
        assert!(check_defaults(ProcessorKind::Resize, &bad).is_err());
    }

    #[test]
    fn options_serialize_camel_case() {
        let v = StepOptions::Favicon(FaviconOptions::default()).to_value();
        assert!(v.get("generateManifest").is_some());
        assert!(v.get("generate_manifest").is_none());
    }
}
