//! Applying a task to real images.
//!
//! The executor walks [`Task::steps_in_processing_order`], never list order,
//! and drives a [`RasterBackend`] through each step:
//!
//! | Step | What happens |
//! |---|---|
//! | resize | scale so the chosen edge equals `dimension` (no upscale unless asked); optional square crop |
//! | crop | anchored or subject-centred window; fill-resize first when `upscale` and the source is too small |
//! | template | exact targets fill-resize then centre crop; single-axis targets scale on that axis |
//! | optimize | encode once per requested format (`auto` → WebP) |
//! | favicon | square icons per size and format, plus manifest, HTML and platform icons per flags |
//! | rename | output base name from the pattern |
//!
//! A task must carry a current validation (see [`Task::has_current_validation`]):
//! one that was never validated, or changed since, is refused, and so is one
//! whose validation has errors. Backend failures
//! stop the image and are reported with the failing step's `order` and kind;
//! nothing is retried.
//!
//! ## Output layout
//!
//! ```text
//! <base>.<ext>                   # one per optimize format (or the source format)
//! <base>/favicon-32x32.png       # favicon set, when a favicon step ran
//! <base>/favicon-32x32.ico
//! <base>/apple-touch-icon.png
//! <base>/android-chrome-192x192.png
//! <base>/site.webmanifest
//! <base>/favicon.html
//! ```

use crate::capabilities::{SubjectDetector, confident_subjects};
use crate::imaging::{
    BackendError, OutputFormat, Quality, RasterBackend, Rect, calculate_anchored_crop,
    calculate_fill_dimensions, calculate_resize_dimensions, calculate_square_crop,
    calculate_subject_crop, content_preservation,
};
use crate::naming::{NameContext, expand_pattern, source_stem};
use crate::options::{
    CropMode, CropOptions, FaviconOptions, OptimizeOptions, ResizeAlgorithm, ResizeMode,
    ResizeOptions, StepOptions, TemplateOptions,
};
use crate::processors::ProcessorKind;
use crate::task::{Step, Task, ValidationStatus};
use crate::templates::{TemplateTarget, find_template};
use chrono::{DateTime, Utc};
use maud::html;
use rayon::prelude::*;
use serde::Serialize;
use std::path::Path;
use std::sync::mpsc::Sender;
use thiserror::Error;

pub const APPLE_TOUCH_SIZE: u32 = 180;
pub const ANDROID_SIZES: [u32; 2] = [192, 512];
pub const MANIFEST_FILE: &str = "site.webmanifest";
pub const FAVICON_HTML_FILE: &str = "favicon.html";

#[derive(Error, Debug)]
pub enum ExecuteError {
    #[error("step {order} ({processor}) failed: {source}")]
    Step {
        order: usize,
        processor: ProcessorKind,
        #[source]
        source: BackendError,
    },
    #[error("cannot read {name}: {source}")]
    Input {
        name: String,
        #[source]
        source: BackendError,
    },
    #[error("final encode failed: {0}")]
    Encode(#[source] BackendError),
    #[error("step {order} (template): unknown template '{id}'")]
    UnknownTemplate { order: usize, id: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("task '{task}' changed since it was last validated; validate it before running")]
    NotValidated { task: String },
    #[error("task is {status} ({errors} errors, {warnings} warnings); refusing to run")]
    Validation {
        status: ValidationStatus,
        errors: usize,
        warnings: usize,
    },
}

/// Progress events emitted while executing.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecuteEvent {
    BatchStarted {
        task: String,
        images: usize,
    },
    StepApplied {
        source: String,
        order: usize,
        processor: ProcessorKind,
        width: u32,
        height: u32,
        /// Subject area kept by an AI crop, in percent.
        preservation: Option<f64>,
    },
    ImageFinished {
        position: usize,
        source: String,
        files: Vec<String>,
    },
    ImageFailed {
        position: usize,
        source: String,
        error: String,
    },
}

fn emit(events: Option<&Sender<ExecuteEvent>>, event: ExecuteEvent) {
    if let Some(tx) = events {
        tx.send(event).ok();
    }
}

/// One source image.
#[derive(Debug, Clone)]
pub struct InputImage {
    /// File name, used for `{name}` and the default output name.
    pub name: String,
    pub bytes: Vec<u8>,
}

impl InputImage {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn read(path: &Path) -> Result<Self, ExecuteError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, std::fs::read(path)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Image,
    Icon,
    Manifest,
    Html,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    /// Path relative to the output directory.
    pub name: String,
    pub kind: OutputKind,
    pub bytes: Vec<u8>,
}

impl OutputFile {
    pub fn write_to(&self, dir: &Path) -> Result<(), ExecuteError> {
        let path = dir.join(&self.name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }
}

/// Everything produced for one input.
#[derive(Debug, Clone)]
pub struct ImageOutputs {
    pub source: String,
    pub width: u32,
    pub height: u32,
    pub files: Vec<OutputFile>,
}

/// Run-wide settings.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Also refuse tasks whose validation has warnings.
    pub block_on_warnings: bool,
    /// Value of `{timestamp}` for every image in the run.
    pub started_at: DateTime<Utc>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            block_on_warnings: false,
            started_at: Utc::now(),
        }
    }
}

/// Refuse tasks without a current validation, and tasks that validation
/// marks as blocked.
pub fn check_runnable(task: &Task, options: &RunOptions) -> Result<(), ExecuteError> {
    if !task.has_current_validation() {
        return Err(ExecuteError::NotValidated {
            task: task.name.clone(),
        });
    }
    let summary = task.validation_summary();
    let blocked = !summary.can_proceed
        || (options.block_on_warnings && summary.status == ValidationStatus::HasWarnings);
    if blocked {
        return Err(ExecuteError::Validation {
            status: summary.status,
            errors: summary.error_count,
            warnings: summary.warning_count,
        });
    }
    if summary.status == ValidationStatus::HasWarnings {
        tracing::warn!(
            task = %task.name,
            warnings = summary.warning_count,
            "running task despite validation warnings"
        );
    }
    Ok(())
}

/// Execute `task` on a single image.
///
/// The task must have been validated since its last change; see
/// [`check_runnable`].
pub fn execute_task(
    task: &Task,
    backend: &dyn RasterBackend,
    detector: &dyn SubjectDetector,
    input: &InputImage,
    events: Option<&Sender<ExecuteEvent>>,
) -> Result<ImageOutputs, ExecuteError> {
    let options = RunOptions::default();
    check_runnable(task, &options)?;
    let runner = Runner {
        steps: task.steps_in_processing_order(),
        backend,
        detector,
        options: &options,
        events,
    };
    runner.run(input, 0)
}

/// Execute `task` on every input in parallel.
///
/// The outer error is a refusal to start; per-image failures are returned
/// in input order alongside the successes.
pub fn execute_batch(
    task: &Task,
    backend: &dyn RasterBackend,
    detector: &dyn SubjectDetector,
    inputs: &[InputImage],
    options: &RunOptions,
    events: Option<Sender<ExecuteEvent>>,
) -> Result<Vec<Result<ImageOutputs, ExecuteError>>, ExecuteError> {
    check_runnable(task, options)?;
    tracing::info!(task = %task.name, images = inputs.len(), "starting batch");
    emit(
        events.as_ref(),
        ExecuteEvent::BatchStarted {
            task: task.name.clone(),
            images: inputs.len(),
        },
    );

    let runner = Runner {
        steps: task.steps_in_processing_order(),
        backend,
        detector,
        options,
        events: events.as_ref(),
    };
    let results: Vec<_> = inputs
        .par_iter()
        .enumerate()
        .map(|(position, input)| runner.run(input, position))
        .collect();

    let failed = results.iter().filter(|r| r.is_err()).count();
    tracing::info!(
        task = %task.name,
        succeeded = results.len() - failed,
        failed,
        "batch finished"
    );
    Ok(results)
}

struct Runner<'a> {
    steps: Vec<&'a Step>,
    backend: &'a dyn RasterBackend,
    detector: &'a dyn SubjectDetector,
    options: &'a RunOptions,
    events: Option<&'a Sender<ExecuteEvent>>,
}

/// The image as it moves through the steps.
struct Working {
    bytes: Vec<u8>,
    width: u32,
    height: u32,
}

impl Working {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Mutable per-image state.
struct ImageRun<'a> {
    input: &'a InputImage,
    position: usize,
    working: Working,
    source_format: OutputFormat,
    encoded: Vec<(OutputFormat, Vec<u8>)>,
    favicons: Vec<OutputFile>,
    base_name: String,
}

impl Runner<'_> {
    fn run(&self, input: &InputImage, position: usize) -> Result<ImageOutputs, ExecuteError> {
        let result = self.run_image(input, position);
        match &result {
            Ok(outputs) => emit(
                self.events,
                ExecuteEvent::ImageFinished {
                    position,
                    source: input.name.clone(),
                    files: outputs.files.iter().map(|f| f.name.clone()).collect(),
                },
            ),
            Err(e) => {
                tracing::debug!(source = %input.name, error = %e, "image failed");
                emit(
                    self.events,
                    ExecuteEvent::ImageFailed {
                        position,
                        source: input.name.clone(),
                        error: e.to_string(),
                    },
                );
            }
        }
        result
    }

    fn run_image(&self, input: &InputImage, position: usize) -> Result<ImageOutputs, ExecuteError> {
        let info = self
            .backend
            .identify(&input.bytes)
            .map_err(|source| ExecuteError::Input {
                name: input.name.clone(),
                source,
            })?;
        let source_format = info
            .format
            .strip_prefix("image/")
            .and_then(OutputFormat::from_name)
            .filter(|f| *f != OutputFormat::Ico)
            .unwrap_or(OutputFormat::Png);

        let mut run = ImageRun {
            input,
            position,
            working: Working {
                bytes: input.bytes.clone(),
                width: info.width,
                height: info.height,
            },
            source_format,
            encoded: Vec::new(),
            favicons: Vec::new(),
            base_name: source_stem(&input.name),
        };

        for step in &self.steps {
            let preservation = self.apply(step, &mut run)?;
            emit(
                self.events,
                ExecuteEvent::StepApplied {
                    source: input.name.clone(),
                    order: step.order,
                    processor: step.processor,
                    width: run.working.width,
                    height: run.working.height,
                    preservation,
                },
            );
        }

        self.finish(run)
    }

    /// Apply one step. Returns the content preservation of AI crops.
    fn apply(&self, step: &Step, run: &mut ImageRun<'_>) -> Result<Option<f64>, ExecuteError> {
        let fail = |source: BackendError| ExecuteError::Step {
            order: step.order,
            processor: step.processor,
            source,
        };
        match &step.options {
            StepOptions::Resize(o) => self.resize_step(o, &mut run.working).map_err(fail)?,
            StepOptions::Crop(o) => return self.crop_step(o, &mut run.working).map_err(fail),
            StepOptions::Template(o) => self.template_step(step.order, o, &mut run.working)?,
            StepOptions::Optimize(o) => {
                run.encoded = self.optimize_step(o, &run.working).map_err(fail)?;
            }
            StepOptions::Favicon(o) => {
                run.favicons = self.favicon_step(o, &run.working).map_err(fail)?;
            }
            StepOptions::Rename(o) => {
                let ctx = NameContext {
                    name: &source_stem(&run.input.name),
                    position: run.position,
                    width: run.working.width,
                    height: run.working.height,
                    timestamp: self.options.started_at,
                };
                run.base_name = expand_pattern(o, &ctx);
            }
        }
        Ok(None)
    }

    fn resize_to(
        &self,
        working: &mut Working,
        size: (u32, u32),
        algorithm: ResizeAlgorithm,
    ) -> Result<(), BackendError> {
        if size == working.size() {
            return Ok(());
        }
        working.bytes = self
            .backend
            .resize(&working.bytes, size.0, size.1, algorithm)?;
        (working.width, working.height) = size;
        Ok(())
    }

    fn crop_to(&self, working: &mut Working, rect: Rect) -> Result<(), BackendError> {
        if rect == Rect::new(0, 0, working.width, working.height) {
            return Ok(());
        }
        working.bytes = self.backend.crop(&working.bytes, rect)?;
        (working.width, working.height) = (rect.width, rect.height);
        Ok(())
    }

    fn resize_step(&self, o: &ResizeOptions, working: &mut Working) -> Result<(), BackendError> {
        let mut dimension = o.dimension;
        if let Some(max) = o.max_dimension.filter(|m| *m > 0) {
            dimension = dimension.min(max);
        }
        let dimension = u32::try_from(dimension).unwrap_or(0);
        if dimension == 0 {
            return Err(BackendError::OperationFailed(format!(
                "resize dimension must be positive (got {})",
                o.dimension
            )));
        }
        let target = calculate_resize_dimensions(working.size(), dimension, o.mode, o.upscale);
        self.resize_to(working, target, o.algorithm)?;
        if o.force_square && working.width != working.height {
            self.crop_to(working, calculate_square_crop(working.size()))?;
        }
        Ok(())
    }

    fn crop_step(&self, o: &CropOptions, working: &mut Working) -> Result<Option<f64>, BackendError> {
        let (Ok(w), Ok(h)) = (u32::try_from(o.width), u32::try_from(o.height)) else {
            return Err(BackendError::OperationFailed(format!(
                "crop size must be positive (got {}x{})",
                o.width, o.height
            )));
        };
        if w == 0 || h == 0 {
            return Err(BackendError::OperationFailed(format!(
                "crop size must be positive (got {w}x{h})"
            )));
        }
        let target = (w, h);
        if o.upscale && (w > working.width || h > working.height) {
            let fill = calculate_fill_dimensions(working.size(), target);
            self.resize_to(working, fill, ResizeAlgorithm::Lanczos3)?;
        }

        let (rect, preservation) = if o.mode.is_ai() {
            let detected = self
                .detector
                .detect(&working.bytes, o.mode, &o.objects_to_detect);
            let subjects = confident_subjects(&detected, o.confidence_threshold);
            let rect = calculate_subject_crop(working.size(), target, &subjects);
            (rect, Some(content_preservation(&subjects, &rect)))
        } else {
            (calculate_anchored_crop(working.size(), target, o.mode), None)
        };
        self.crop_to(working, rect)?;
        Ok(preservation)
    }

    fn template_step(
        &self,
        order: usize,
        o: &TemplateOptions,
        working: &mut Working,
    ) -> Result<(), ExecuteError> {
        let id = o.template_id.clone().unwrap_or_default();
        let template = find_template(&id).ok_or_else(|| ExecuteError::UnknownTemplate {
            order,
            id: id.clone(),
        })?;
        let fail = |source: BackendError| ExecuteError::Step {
            order,
            processor: ProcessorKind::Template,
            source,
        };
        let algorithm = ResizeAlgorithm::Lanczos3;
        match template.target() {
            Some(TemplateTarget::Exact { width, height }) => {
                let fill = calculate_fill_dimensions(working.size(), (width, height));
                self.resize_to(working, fill, algorithm).map_err(fail)?;
                let rect =
                    calculate_anchored_crop(working.size(), (width, height), CropMode::Center);
                self.crop_to(working, rect).map_err(fail)?;
            }
            Some(TemplateTarget::Width(width)) => {
                let size =
                    calculate_resize_dimensions(working.size(), width, ResizeMode::Width, true);
                self.resize_to(working, size, algorithm).map_err(fail)?;
            }
            Some(TemplateTarget::Height(height)) => {
                let size =
                    calculate_resize_dimensions(working.size(), height, ResizeMode::Height, true);
                self.resize_to(working, size, algorithm).map_err(fail)?;
            }
            None => tracing::debug!(template = %id, "template has no fixed axis"),
        }
        Ok(())
    }

    fn optimize_step(
        &self,
        o: &OptimizeOptions,
        working: &Working,
    ) -> Result<Vec<(OutputFormat, Vec<u8>)>, BackendError> {
        let quality = Quality::new(o.quality);
        let mut encoded = Vec::new();
        for name in o.format.formats() {
            let Some(format) = OutputFormat::from_name(name) else {
                tracing::warn!(format = %name, "skipping unsupported output format");
                continue;
            };
            if encoded.iter().any(|(f, _)| *f == format) {
                continue;
            }
            let bytes = self.backend.encode(&working.bytes, format, quality)?;
            encoded.push((format, bytes));
        }
        Ok(encoded)
    }

    fn favicon_step(
        &self,
        o: &FaviconOptions,
        working: &Working,
    ) -> Result<Vec<OutputFile>, BackendError> {
        let square = if working.width == working.height {
            working.bytes.clone()
        } else {
            self.backend
                .crop(&working.bytes, calculate_square_crop(working.size()))?
        };
        let icon = |size: u32, format: OutputFormat| -> Result<Vec<u8>, BackendError> {
            let resized = self
                .backend
                .resize(&square, size, size, ResizeAlgorithm::Lanczos3)?;
            self.backend.encode(&resized, format, Quality::new(100))
        };

        let mut files = Vec::new();
        let mut links = Vec::new();
        for &size in &o.sizes {
            let Ok(size) = u32::try_from(size) else {
                continue;
            };
            for format in &o.formats {
                let format = match format.to_ascii_lowercase().as_str() {
                    "png" => OutputFormat::Png,
                    "ico" if size <= crate::imaging::rust_backend::ICO_MAX_EDGE => {
                        OutputFormat::Ico
                    }
                    other => {
                        tracing::debug!(format = other, size, "no raster favicon for format");
                        continue;
                    }
                };
                let name = format!("favicon-{size}x{size}.{}", format.extension());
                files.push(OutputFile {
                    name: name.clone(),
                    kind: OutputKind::Icon,
                    bytes: icon(size, format)?,
                });
                links.push(IconLink::new(name, size, format));
            }
        }

        if o.include_apple_touch {
            files.push(OutputFile {
                name: "apple-touch-icon.png".into(),
                kind: OutputKind::Icon,
                bytes: icon(APPLE_TOUCH_SIZE, OutputFormat::Png)?,
            });
        }
        if o.include_android {
            for size in ANDROID_SIZES {
                let name = format!("android-chrome-{size}x{size}.png");
                files.push(OutputFile {
                    name: name.clone(),
                    kind: OutputKind::Icon,
                    bytes: icon(size, OutputFormat::Png)?,
                });
                links.push(IconLink::new(name, size, OutputFormat::Png));
            }
        }
        if o.generate_manifest {
            files.push(OutputFile {
                name: MANIFEST_FILE.into(),
                kind: OutputKind::Manifest,
                bytes: web_manifest(o, &links)?,
            });
        }
        if o.generate_html {
            files.push(OutputFile {
                name: FAVICON_HTML_FILE.into(),
                kind: OutputKind::Html,
                bytes: favicon_html(o, &links).into_bytes(),
            });
        }
        Ok(files)
    }

    fn finish(&self, run: ImageRun<'_>) -> Result<ImageOutputs, ExecuteError> {
        let encoded = if run.encoded.is_empty() {
            let bytes = self
                .backend
                .encode(&run.working.bytes, run.source_format, Quality::default())
                .map_err(ExecuteError::Encode)?;
            vec![(run.source_format, bytes)]
        } else {
            run.encoded
        };

        let mut files: Vec<OutputFile> = encoded
            .into_iter()
            .map(|(format, bytes)| OutputFile {
                name: format!("{}.{}", run.base_name, format.extension()),
                kind: OutputKind::Image,
                bytes,
            })
            .collect();
        files.extend(run.favicons.into_iter().map(|f| OutputFile {
            name: format!("{}/{}", run.base_name, f.name),
            ..f
        }));

        Ok(ImageOutputs {
            source: run.input.name.clone(),
            width: run.working.width,
            height: run.working.height,
            files,
        })
    }
}

// ============================================================================
// Favicon extras
// ============================================================================

#[derive(Debug, Clone, Serialize)]
struct IconLink {
    src: String,
    sizes: String,
    #[serde(rename = "type")]
    mime: &'static str,
}

impl IconLink {
    fn new(src: String, size: u32, format: OutputFormat) -> Self {
        Self {
            src,
            sizes: format!("{size}x{size}"),
            mime: format.mime_type(),
        }
    }
}

#[derive(Serialize)]
struct WebManifest<'a> {
    name: &'a str,
    short_name: &'a str,
    icons: Vec<&'a IconLink>,
    theme_color: &'a str,
    background_color: &'a str,
    display: &'a str,
}

fn web_manifest(o: &FaviconOptions, links: &[IconLink]) -> Result<Vec<u8>, BackendError> {
    let manifest = WebManifest {
        name: &o.app_name,
        short_name: &o.app_name,
        icons: links.iter().filter(|l| l.mime == "image/png").collect(),
        theme_color: &o.theme_color,
        background_color: &o.background_color,
        display: "standalone",
    };
    serde_json::to_vec_pretty(&manifest)
        .map_err(|e| BackendError::OperationFailed(format!("manifest: {e}")))
}

fn favicon_html(o: &FaviconOptions, links: &[IconLink]) -> String {
    html! {
        @for link in links {
            link rel="icon" type=(link.mime) sizes=(link.sizes) href=(link.src);
        }
        @if o.include_apple_touch {
            link rel="apple-touch-icon" sizes="180x180" href="apple-touch-icon.png";
        }
        @if o.generate_manifest {
            link rel="manifest" href=(MANIFEST_FILE);
        }
        meta name="theme-color" content=(o.theme_color);
    }
    .into_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{DetectedSubject, NoDetector};
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::validation::codes;
    use serde_json::json;

    fn input(w: u32, h: u32) -> InputImage {
        InputImage::new("photos/dawn.jpg", MockBackend::image(w, h))
    }

    fn names(outputs: &ImageOutputs) -> Vec<&str> {
        outputs.files.iter().map(|f| f.name.as_str()).collect()
    }

    fn run(task: &mut Task, backend: &MockBackend, w: u32, h: u32) -> ImageOutputs {
        task.validate(None);
        execute_task(task, backend, &NoDetector, &input(w, h), None).unwrap()
    }

    #[test]
    fn steps_run_in_canonical_order() {
        let mut task = Task::new("t");
        task.add_step("optimize", json!({"format": "webp", "quality": 80}))
            .unwrap();
        task.add_step("crop", json!({"width": 500, "height": 500}))
            .unwrap();
        task.add_step("resize", json!({"dimension": 1000})).unwrap();

        let backend = MockBackend::new();
        let out = run(&mut task, &backend, 4000, 3000);
        assert_eq!(names(&out), vec!["dawn.webp"]);
        assert_eq!((out.width, out.height), (500, 500));

        let ops = backend.get_operations();
        assert_eq!(ops[0], RecordedOp::Identify);
        assert!(matches!(
            ops[1],
            RecordedOp::Resize {
                width: 1000,
                height: 750,
                ..
            }
        ));
        assert_eq!(ops[2], RecordedOp::Crop(Rect::new(250, 125, 500, 500)));
        assert!(matches!(
            ops[3],
            RecordedOp::Encode {
                width: 500,
                height: 500,
                format: OutputFormat::Webp,
                quality: 80
            }
        ));
    }

    #[test]
    fn resize_does_not_upscale_by_default() {
        let mut task = Task::new("t");
        task.add_step("resize", json!({"dimension": 2000})).unwrap();
        let backend = MockBackend::new();
        let out = run(&mut task, &backend, 800, 600);
        assert_eq!((out.width, out.height), (800, 600));
        assert!(!backend
            .get_operations()
            .iter()
            .any(|op| matches!(op, RecordedOp::Resize { .. })));
    }

    #[test]
    fn untouched_image_keeps_source_format() {
        let mut task = Task::new("t");
        let backend = MockBackend::new();
        let out = run(&mut task, &backend, 10, 10);
        // The mock reports PNG for every input
        assert_eq!(names(&out), vec!["dawn.png"]);
    }

    #[test]
    fn multi_format_optimize_and_rename() {
        let mut task = Task::new("t");
        task.add_step("rename", json!({"pattern": "{name}_{width}w", "lowercase": true}))
            .unwrap();
        task.add_step("optimize", json!({"format": ["webp", "jpg", "auto"]}))
            .unwrap();
        let backend = MockBackend::new();
        let out = run(&mut task, &backend, 64, 32);
        assert_eq!(names(&out), vec!["dawn_64w.webp", "dawn_64w.jpg"]);
    }

    #[test]
    fn favicon_set_matches_output_estimate() {
        let mut task = Task::new("t");
        task.add_step("crop", json!({"width": 512, "height": 512}))
            .unwrap();
        task.add_step(
            "favicon",
            json!({
                "sizes": [16, 32, 48],
                "formats": ["png", "ico"],
                "generateManifest": true,
            }),
        )
        .unwrap();
        let backend = MockBackend::new();
        let out = run(&mut task, &backend, 1024, 768);
        assert_eq!(out.files.len(), task.estimate_output_count());
        assert!(names(&out).contains(&"dawn/favicon-32x32.ico"));
        assert!(names(&out).contains(&"dawn/site.webmanifest"));

        let manifest = out
            .files
            .iter()
            .find(|f| f.kind == OutputKind::Manifest)
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&manifest.bytes).unwrap();
        assert_eq!(value["name"], "App");
        assert_eq!(value["icons"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn favicon_extras_and_html() {
        let mut task = Task::new("t");
        task.add_step(
            "favicon",
            json!({
                "sizes": [32],
                "formats": ["png", "svg"],
                "generateHtml": true,
                "includeAppleTouch": true,
                "includeAndroid": true,
                "themeColor": "#112233",
            }),
        )
        .unwrap();
        let backend = MockBackend::new();
        let out = run(&mut task, &backend, 600, 400);
        let files = names(&out);
        assert!(files.contains(&"dawn/favicon-32x32.png"));
        assert!(!files.iter().any(|f| f.ends_with(".svg")));
        assert!(files.contains(&"dawn/apple-touch-icon.png"));
        assert!(files.contains(&"dawn/android-chrome-512x512.png"));

        let html = out
            .files
            .iter()
            .find(|f| f.kind == OutputKind::Html)
            .unwrap();
        let html = String::from_utf8(html.bytes.clone()).unwrap();
        assert!(html.contains(r#"rel="apple-touch-icon""#));
        assert!(html.contains(r#"href="favicon-32x32.png""#));
        assert!(html.contains("#112233"));

        // Non-square source is cropped to a square before icons are made
        assert!(backend
            .get_operations()
            .contains(&RecordedOp::Crop(Rect::new(100, 0, 400, 400))));
    }

    #[test]
    fn template_exact_fills_then_crops() {
        let mut task = Task::new("t");
        task.add_template("open-graph");
        let backend = MockBackend::new();
        let out = run(&mut task, &backend, 1000, 1000);
        assert_eq!((out.width, out.height), (1200, 630));
    }

    #[test]
    fn template_flexible_axis_keeps_aspect() {
        let mut task = Task::new("t");
        task.add_template("blog-inline");
        let backend = MockBackend::new();
        let out = run(&mut task, &backend, 1600, 1200);
        assert_eq!((out.width, out.height), (800, 600));
    }

    #[test]
    fn unknown_template_fails_at_execution() {
        let mut task = Task::new("t");
        task.add_template("myspace-banner");
        assert!(task.validate(None).errors.is_empty());
        let err = execute_task(&task, &MockBackend::new(), &NoDetector, &input(10, 10), None)
            .unwrap_err();
        assert!(matches!(err, ExecuteError::UnknownTemplate { order: 1, .. }));
    }

    #[test]
    fn ai_crop_follows_detected_subjects() {
        struct FaceAtRight;
        impl SubjectDetector for FaceAtRight {
            fn detect(&self, _: &[u8], _: CropMode, _: &[String]) -> Vec<DetectedSubject> {
                vec![
                    DetectedSubject {
                        label: "face".into(),
                        confidence: 95.0,
                        rect: Rect::new(900, 400, 80, 80),
                    },
                    DetectedSubject {
                        label: "person".into(),
                        confidence: 20.0,
                        rect: Rect::new(0, 0, 50, 50),
                    },
                ]
            }
        }
        let mut task = Task::new("t");
        task.add_step("crop", json!({"width": 400, "height": 400, "mode": "face"}))
            .unwrap();
        task.validate(None);
        let backend = MockBackend::new();
        let (tx, rx) = std::sync::mpsc::channel();
        execute_task(&task, &backend, &FaceAtRight, &input(1000, 1000), Some(&tx)).unwrap();
        drop(tx);

        assert!(backend
            .get_operations()
            .contains(&RecordedOp::Crop(Rect::new(600, 240, 400, 400))));
        let preservation = rx.iter().find_map(|e| match e {
            ExecuteEvent::StepApplied { preservation, .. } => preservation,
            _ => None,
        });
        assert_eq!(preservation, Some(100.0));
    }

    #[test]
    fn crop_clamps_without_upscale_and_fills_with_upscale() {
        let mut task = Task::new("t");
        task.add_step("crop", json!({"width": 800, "height": 800}))
            .unwrap();
        let out = run(&mut task, &MockBackend::new(), 600, 400);
        assert_eq!((out.width, out.height), (600, 400));

        let mut task = Task::new("t");
        task.add_step("crop", json!({"width": 800, "height": 800, "upscale": true}))
            .unwrap();
        let out = run(&mut task, &MockBackend::new(), 600, 400);
        assert_eq!((out.width, out.height), (800, 800));
    }

    #[test]
    fn backend_failure_carries_step() {
        let mut task = Task::new("t");
        task.add_step("optimize", json!({})).unwrap();
        task.add_step("resize", json!({"dimension": 100})).unwrap();
        task.validate(None);
        let err = execute_task(
            &task,
            &MockBackend::failing_on("resize"),
            &NoDetector,
            &input(400, 400),
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ExecuteError::Step {
                order: 2,
                processor: ProcessorKind::Resize,
                ..
            }
        ));
    }

    #[test]
    fn invalid_task_is_refused() {
        let mut task = Task::new("t");
        task.add_step("crop", json!({"width": -5, "height": 500}))
            .unwrap();
        task.validate(None);
        let err = execute_task(&task, &MockBackend::new(), &NoDetector, &input(10, 10), None)
            .unwrap_err();
        assert!(matches!(
            err,
            ExecuteError::Validation {
                status: ValidationStatus::Invalid,
                ..
            }
        ));
    }

    #[test]
    fn unvalidated_or_changed_task_is_refused() {
        let mut task = Task::new("t");
        task.add_step("resize", json!({"dimension": 100})).unwrap();
        let err = execute_task(&task, &MockBackend::new(), &NoDetector, &input(10, 10), None)
            .unwrap_err();
        assert!(matches!(err, ExecuteError::NotValidated { .. }));

        task.validate(None);
        assert!(check_runnable(&task, &RunOptions::default()).is_ok());

        task.add_step("crop", json!({"width": -5, "height": 500}))
            .unwrap();
        let backend = MockBackend::new();
        let err = execute_batch(
            &task,
            &backend,
            &NoDetector,
            &[input(10, 10)],
            &RunOptions::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ExecuteError::NotValidated { .. }));
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn warnings_block_only_when_configured() {
        let mut task = Task::new("t");
        task.add_step("optimize", json!({"quality": 99})).unwrap();
        let result = task.validate(None);
        assert!(result.has_code(codes::HIGH_QUALITY));

        let strict = RunOptions {
            block_on_warnings: true,
            ..RunOptions::default()
        };
        assert!(check_runnable(&task, &strict).is_err());
        assert!(check_runnable(&task, &RunOptions::default()).is_ok());
    }

    #[test]
    fn batch_keeps_input_order_and_reports_failures() {
        let mut task = Task::new("t");
        task.add_step("rename", json!({"pattern": "img-{index}", "zeroPad": 2}))
            .unwrap();
        let inputs = vec![
            InputImage::new("a.png", MockBackend::image(10, 10)),
            InputImage::new("broken.png", b"garbage".to_vec()),
            InputImage::new("c.png", MockBackend::image(20, 20)),
        ];
        task.validate(None);
        let (tx, rx) = std::sync::mpsc::channel();
        let results = execute_batch(
            &task,
            &MockBackend::new(),
            &NoDetector,
            &inputs,
            &RunOptions::default(),
            Some(tx),
        )
        .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(names(results[0].as_ref().unwrap()), vec!["img-01.png"]);
        assert!(matches!(results[1], Err(ExecuteError::Input { .. })));
        assert_eq!(names(results[2].as_ref().unwrap()), vec!["img-03.png"]);

        let events: Vec<ExecuteEvent> = rx.iter().collect();
        assert!(matches!(events[0], ExecuteEvent::BatchStarted { images: 3, .. }));
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, ExecuteEvent::ImageFailed { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn output_files_write_into_subdirectories() {
        let tmp = tempfile::TempDir::new().unwrap();
        let file = OutputFile {
            name: "dawn/favicon-16x16.png".into(),
            kind: OutputKind::Icon,
            bytes: vec![1, 2, 3],
        };
        file.write_to(tmp.path()).unwrap();
        assert_eq!(
            std::fs::read(tmp.path().join("dawn/favicon-16x16.png")).unwrap(),
            vec![1, 2, 3]
        );
    }
}
