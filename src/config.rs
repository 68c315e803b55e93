//! Pipeline configuration module.
//!
//! Handles loading, validating, and merging `imgpipe.toml`. Stock defaults
//! are the base layer; a user file overrides only the keys it names.
//!
//! ## Config File Location
//!
//! `imgpipe.toml` is looked up in the working directory, or passed
//! explicitly with `--config`.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional
//!
//! [defaults.resize]          # Option defaults per processor kind, between
//! dimension = 1600           # built-in defaults and options in a task file.
//!                            # Keys use the task-file (camelCase) names.
//! [defaults.optimize]
//! quality = 80
//! format = ["webp", "avif"]
//!
//! [processing]
//! max_processes = 4          # Max parallel workers (omit for auto = CPU cores)
//!
//! [execution]
//! block_on_warnings = false  # Refuse to run tasks that have warnings
//! ```
//!
//! ## Validation
//!
//! Unknown sections and keys are rejected. Every `[defaults.<kind>]` table
//! is checked strictly against that kind's options: a misspelled option or
//! a value of the wrong type is a load error, unlike task files where such
//! keys are dropped during resolution.

use crate::options::{OptionResolver, check_defaults};
use crate::processors::ProcessorKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "imgpipe.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `imgpipe.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Per-kind option defaults.
    pub defaults: DefaultsConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
    /// Execution policy.
    pub execution: ExecutionConfig,
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (kind, table) in self.defaults.tables() {
            check_defaults(kind, table)
                .map_err(|e| ConfigError::Validation(format!("defaults.{kind}: {e}")))?;
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// An option resolver layered with the configured defaults.
    pub fn resolver(&self) -> OptionResolver {
        self.defaults
            .tables()
            .into_iter()
            .fold(OptionResolver::new(), |resolver, (kind, table)| {
                resolver.with_defaults(kind, table.clone())
            })
    }
}

/// Option defaults per processor kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefaultsConfig {
    pub resize: Map<String, Value>,
    pub crop: Map<String, Value>,
    pub optimize: Map<String, Value>,
    pub rename: Map<String, Value>,
    pub template: Map<String, Value>,
    pub favicon: Map<String, Value>,
}

impl DefaultsConfig {
    pub fn tables(&self) -> [(ProcessorKind, &Map<String, Value>); 6] {
        [
            (ProcessorKind::Resize, &self.resize),
            (ProcessorKind::Crop, &self.crop),
            (ProcessorKind::Optimize, &self.optimize),
            (ProcessorKind::Rename, &self.rename),
            (ProcessorKind::Template, &self.template),
            (ProcessorKind::Favicon, &self.favicon),
        ]
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionConfig {
    /// When true, a task whose summary has warnings is not run.
    pub block_on_warnings: bool,
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(PipelineConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<PipelineConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load `imgpipe.toml` from the given directory.
pub fn load_config(dir: &Path) -> Result<PipelineConfig, ConfigError> {
    load_config_file(&dir.join(CONFIG_FILE_NAME))
}

/// Load a specific config file, falling back to stock defaults if absent.
pub fn load_config_file(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    let config = resolve_config(base, overlay)?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Returns a fully-commented stock `imgpipe.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# imgpipe Configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Option defaults per processor kind
# ---------------------------------------------------------------------------
# Layered between the built-in defaults and the options in a task file:
#   built-in  ->  [defaults.<kind>]  ->  task file
# Keys use the same names as task files. Misspelled keys or wrong types
# are rejected when the config is loaded.

[defaults.resize]
# dimension = 1024          # Target edge length in pixels
# mode = "longest"          # longest | width | height
# algorithm = "lanczos3"    # lanczos3 | cubic | linear | gaussian | nearest
# upscale = false
# forceSquare = false
# maxDimension = 10000

[defaults.crop]
# width = 1080
# height = 1080
# mode = "center"           # center, top, bottom, left, right, top-left, ...
#                           # smart, face, object, saliency, entropy
# upscale = false
# confidenceThreshold = 70  # AI modes only, 0-100

[defaults.optimize]
# quality = 85              # 1-100 (AVIF is capped at 63)
# format = "auto"           # auto | jpg | png | webp | avif, or a list
# preserveTransparency = false
# browserSupport = ["modern", "legacy"]
# compressionMode = "adaptive"  # adaptive | aggressive | balanced
# analyzeContent = false

[defaults.rename]
# pattern = "{name}-{index}"
# startIndex = 1
# zeroPad = 0
# lowercase = false

[defaults.template]
# templateId = "open-graph"

[defaults.favicon]
# sizes = [16, 32, 48, 64, 128, 256]
# formats = ["png", "ico"]
# generateManifest = true
# generateHtml = false
# includeAppleTouch = false
# includeAndroid = false
# appName = "App"
# themeColor = "#ffffff"
# backgroundColor = "#ffffff"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel image workers. Omit for auto (= number of CPU cores).
# Values larger than the core count are clamped down.
# max_processes = 4

# ---------------------------------------------------------------------------
# Execution
# ---------------------------------------------------------------------------
[execution]
# Refuse to run a task whose validation reports warnings.
# Errors always block.
block_on_warnings = false
"##
}
