//! The task orchestrator: an ordered list of configured steps.
//!
//! A [`Task`] owns its steps exclusively. Every structural mutation
//! (add, remove, move) reindexes the list so that `steps[i].order == i + 1`
//! always holds, and recomputes the derived [`TaskMetadata`].
//!
//! Validation is explicit. [`Task::validate`] runs the per-step rules over
//! every enabled step, then the ordering rules once over the whole enabled
//! sequence, and caches the result. The cached result is *not* refreshed by
//! later mutations; [`Task::last_validation`] is stale until the next call,
//! and [`Task::has_current_validation`] reports whether it is.
//!
//! Two orders exist:
//!
//! - **list order**: what the user built, returned by [`Task::enabled_steps`]
//! - **processing order**: what an executor must follow, returned by
//!   [`Task::steps_in_processing_order`] (stable sort by canonical rank)

use crate::capabilities::{Capabilities, CapabilityProbe, SubjectImage};
use crate::logic::validate_ordering;
use crate::options::{
    CompressionMode, CropOptions, FaviconOptions, FormatSelection, OptimizeOptions,
    OptionResolver, RenameOptions, ResizeOptions, StepOptions, TemplateOptions,
};
use crate::processors::{OutputType, ProcessorKind, UnknownProcessor};
use crate::step_validator::validate_step;
use crate::validation::{Severity, ValidationMessage, ValidationResult, codes};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error(transparent)]
    InvalidProcessorKind(#[from] UnknownProcessor),
    #[error("step not found: {0}")]
    StepNotFound(String),
}

pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// ============================================================================
// Step
// ============================================================================

/// Facts about a step derived from its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepMetadata {
    pub requires_favicon: bool,
    pub is_batchable: bool,
    pub output_type: OutputType,
}

impl StepMetadata {
    pub fn for_kind(kind: ProcessorKind) -> Self {
        let info = kind.info();
        Self {
            requires_favicon: kind == ProcessorKind::Favicon,
            is_batchable: info.batchable,
            output_type: info.output_type,
        }
    }
}

/// One configured processing operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub id: String,
    pub processor: ProcessorKind,
    pub options: StepOptions,
    /// 1-based position in the owning task.
    pub order: usize,
    pub enabled: bool,
    pub added_at: DateTime<Utc>,
    pub metadata: StepMetadata,
}

impl Step {
    /// A fresh enabled step. `options` are taken as already resolved.
    pub fn new(options: StepOptions, order: usize) -> Self {
        let processor = options.kind();
        Self {
            id: new_id(),
            processor,
            options,
            order,
            enabled: true,
            added_at: Utc::now(),
            metadata: StepMetadata::for_kind(processor),
        }
    }

    /// Relative cost of this step for one image.
    pub fn cost(&self) -> u64 {
        let base = self.processor.info().base_cost as f64;
        let factor = match &self.options {
            StepOptions::Favicon(f) => (f.sizes.len() * f.formats.len()) as f64,
            StepOptions::Crop(c) if c.mode.is_ai() => 3.0,
            StepOptions::Optimize(o) if o.compression_mode == CompressionMode::Aggressive => {
                if o.analyze_content { 1.5 * 1.2 } else { 1.5 }
            }
            _ => 1.0,
        };
        (base * factor).round() as u64
    }

    /// Files this step adds beyond the single base output.
    pub fn extra_outputs(&self) -> usize {
        match &self.options {
            StepOptions::Favicon(f) => {
                let flags = [
                    f.generate_manifest,
                    f.generate_html,
                    f.include_apple_touch,
                    f.include_android,
                ];
                f.sizes.len() * f.formats.len() + flags.iter().filter(|&&b| b).count()
            }
            StepOptions::Optimize(o) => match &o.format {
                FormatSelection::Multiple(list) => list.len().saturating_sub(1),
                FormatSelection::Single(_) => 0,
            },
            _ => 0,
        }
    }

    fn uses_smart_crop(&self) -> bool {
        matches!(&self.options, StepOptions::Crop(c) if c.mode.is_ai())
    }
}

/// Reference to a step by id or 0-based position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepRef {
    Id(String),
    Index(usize),
}

impl From<usize> for StepRef {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for StepRef {
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

impl fmt::Display for StepRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id {id}"),
            Self::Index(i) => write!(f, "index {i}"),
        }
    }
}

// ============================================================================
// Derived data
// ============================================================================

/// Classification by the set of processor kinds present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    FaviconGeneration,
    TemplateApplication,
    FullProcessing,
    OptimizationOnly,
    #[default]
    General,
}

impl TaskType {
    /// Highest-priority match wins: favicon, template, resize+crop+optimize,
    /// a lone optimize, everything else.
    pub fn classify(kinds: &[ProcessorKind]) -> Self {
        let has = |k: ProcessorKind| kinds.contains(&k);
        if has(ProcessorKind::Favicon) {
            Self::FaviconGeneration
        } else if has(ProcessorKind::Template) {
            Self::TemplateApplication
        } else if has(ProcessorKind::Resize)
            && has(ProcessorKind::Crop)
            && has(ProcessorKind::Optimize)
        {
            Self::FullProcessing
        } else if !kinds.is_empty() && kinds.iter().all(|&k| k == ProcessorKind::Optimize) {
            Self::OptimizationOnly
        } else {
            Self::General
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FaviconGeneration => "favicon_generation",
            Self::TemplateApplication => "template_application",
            Self::FullProcessing => "full_processing",
            Self::OptimizationOnly => "optimization_only",
            Self::General => "general",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate facts recomputed after every mutation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMetadata {
    /// Relative units for one image.
    pub estimated_duration: u64,
    pub estimated_outputs: usize,
    pub category: TaskType,
    pub processor_count: usize,
    pub has_smart_crop: bool,
    pub has_auto_optimization: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Valid,
    HasWarnings,
    Invalid,
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Valid => "valid",
            Self::HasWarnings => "has_warnings",
            Self::Invalid => "invalid",
        })
    }
}

/// Single source of truth for "may this task run".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub total_steps: usize,
    pub enabled_steps: usize,
    pub error_count: usize,
    /// Entries in the warnings list, info-level ones included.
    pub warning_count: usize,
    pub info_count: usize,
    pub task_type: TaskType,
    pub status: ValidationStatus,
    pub can_proceed: bool,
    pub estimated_outputs: usize,
    pub estimated_duration: String,
    pub has_smart_crop: bool,
    pub has_auto_optimization: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepCost {
    pub order: usize,
    pub processor: ProcessorKind,
    pub cost: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEstimate {
    pub per_image: u64,
    pub total: u64,
    pub formatted: String,
    pub steps: Vec<StepCost>,
}

/// Render relative units as a duration, reading one unit as a millisecond.
pub fn format_duration(units: u64) -> String {
    if units < 1000 {
        format!("{units}ms")
    } else if units < 60_000 {
        format!("{:.1}s", units as f64 / 1000.0)
    } else {
        let secs = units / 1000;
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

// ============================================================================
// Task
// ============================================================================

#[derive(Debug, Clone)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub description: String,
    steps: Vec<Step>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    metadata: TaskMetadata,
    last_validation: ValidationResult,
    validation_current: bool,
    resolver: OptionResolver,
}

impl Default for Task {
    fn default() -> Self {
        Self::new("Untitled task")
    }
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        let mut task = Self {
            id: new_id(),
            name: name.into(),
            description: String::new(),
            steps: Vec::new(),
            created_at: now,
            updated_at: now,
            metadata: TaskMetadata::default(),
            last_validation: ValidationResult::new(),
            validation_current: false,
            resolver: OptionResolver::new(),
        };
        task.refresh_metadata();
        task
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Use `resolver` (e.g. with configured defaults) for steps added later.
    pub fn with_resolver(mut self, resolver: OptionResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn resolver(&self) -> &OptionResolver {
        &self.resolver
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn metadata(&self) -> &TaskMetadata {
        &self.metadata
    }

    /// Result of the most recent validation pass; stale after mutation.
    pub fn last_validation(&self) -> &ValidationResult {
        &self.last_validation
    }

    /// True when the task was validated (or loaded with a stored
    /// validation) and has not been changed since.
    pub fn has_current_validation(&self) -> bool {
        self.validation_current
    }

    pub(crate) fn restore_validation(&mut self, validation: ValidationResult) {
        self.last_validation = validation;
        self.validation_current = true;
    }

    // ------------------------------------------------------------------------
    // Adding steps
    // ------------------------------------------------------------------------

    /// Add a step by kind name. Unknown kinds fail fast.
    pub fn add_step(&mut self, kind: &str, raw: Value) -> Result<&mut Self, TaskError> {
        let kind: ProcessorKind = kind.parse()?;
        Ok(self.add_kind(kind, &raw))
    }

    pub fn add_kind(&mut self, kind: ProcessorKind, raw: &Value) -> &mut Self {
        let options = self.resolver.resolve(kind, raw);
        self.push_step(Step::new(options, 0))
    }

    /// Add typed options; they still go through resolution.
    pub fn add_options(&mut self, options: StepOptions) -> &mut Self {
        let options = self.resolver.resolve_options(&options);
        self.push_step(Step::new(options, 0))
    }

    pub fn add_resize(&mut self, options: ResizeOptions) -> &mut Self {
        self.add_options(StepOptions::Resize(options))
    }

    pub fn add_crop(&mut self, options: CropOptions) -> &mut Self {
        self.add_options(StepOptions::Crop(options))
    }

    pub fn add_optimize(&mut self, options: OptimizeOptions) -> &mut Self {
        self.add_options(StepOptions::Optimize(options))
    }

    pub fn add_rename(&mut self, options: RenameOptions) -> &mut Self {
        self.add_options(StepOptions::Rename(options))
    }

    pub fn add_favicon(&mut self, options: FaviconOptions) -> &mut Self {
        self.add_options(StepOptions::Favicon(options))
    }

    pub fn add_template(&mut self, template_id: impl Into<String>) -> &mut Self {
        self.add_options(StepOptions::Template(TemplateOptions {
            template_id: Some(template_id.into()),
        }))
    }

    /// Append a fully built step. Its `order` is overwritten.
    pub(crate) fn push_step(&mut self, step: Step) -> &mut Self {
        tracing::debug!(task = %self.id, processor = %step.processor, "adding step");
        self.steps.push(step);
        self.touch();
        self
    }

    // ------------------------------------------------------------------------
    // Structural mutation
    // ------------------------------------------------------------------------

    fn position(&self, step: &StepRef) -> Option<usize> {
        match step {
            StepRef::Id(id) => self.steps.iter().position(|s| &s.id == id),
            StepRef::Index(i) => (*i < self.steps.len()).then_some(*i),
        }
    }

    pub fn step(&self, step: impl Into<StepRef>) -> Option<&Step> {
        self.position(&step.into()).map(|i| &self.steps[i])
    }

    pub fn remove_step(&mut self, step: impl Into<StepRef>) -> bool {
        let Some(index) = self.position(&step.into()) else {
            return false;
        };
        let removed = self.steps.remove(index);
        tracing::debug!(task = %self.id, processor = %removed.processor, index, "removed step");
        self.touch();
        true
    }

    pub fn move_step_up(&mut self, index: usize) -> bool {
        if index == 0 || index >= self.steps.len() {
            return false;
        }
        self.steps.swap(index - 1, index);
        self.touch();
        true
    }

    pub fn move_step_down(&mut self, index: usize) -> bool {
        if index + 1 >= self.steps.len() {
            return false;
        }
        self.steps.swap(index, index + 1);
        self.touch();
        true
    }

    pub fn set_step_enabled(&mut self, index: usize, enabled: bool) -> bool {
        let Some(step) = self.steps.get_mut(index) else {
            return false;
        };
        step.enabled = enabled;
        self.touch();
        true
    }

    /// Merge `raw` over a step's current options and re-resolve.
    pub fn update_step(
        &mut self,
        step: impl Into<StepRef>,
        raw: &Value,
    ) -> Result<&mut Self, TaskError> {
        let step = step.into();
        let index = self
            .position(&step)
            .ok_or_else(|| TaskError::StepNotFound(step.to_string()))?;
        let current = &self.steps[index];
        let mut merged = current.options.to_value();
        if let (Value::Object(base), Value::Object(overlay)) = (&mut merged, raw) {
            for (key, value) in overlay {
                base.insert(key.clone(), value.clone());
            }
        }
        let options = self.resolver.resolve(current.processor, &merged);
        self.steps[index].options = options;
        self.touch();
        Ok(self)
    }

    fn touch(&mut self) {
        for (i, step) in self.steps.iter_mut().enumerate() {
            step.order = i + 1;
        }
        self.updated_at = Utc::now();
        self.validation_current = false;
        self.refresh_metadata();
    }

    fn refresh_metadata(&mut self) {
        let enabled = self.enabled_steps();
        let kinds: Vec<ProcessorKind> = enabled.iter().map(|s| s.processor).collect();
        let metadata = TaskMetadata {
            estimated_duration: enabled.iter().map(|s| s.cost()).sum(),
            estimated_outputs: 1 + enabled.iter().map(|s| s.extra_outputs()).sum::<usize>(),
            category: TaskType::classify(&kinds),
            processor_count: self.steps.len(),
            has_smart_crop: enabled.iter().any(|s| s.uses_smart_crop()),
            has_auto_optimization: enabled.iter().any(|s| {
                matches!(&s.options, StepOptions::Optimize(o) if o.format.contains("auto"))
            }),
        };
        self.metadata = metadata;
    }

    // ------------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------------

    /// Enabled steps in list order.
    pub fn enabled_steps(&self) -> Vec<&Step> {
        self.steps.iter().filter(|s| s.enabled).collect()
    }

    /// Enabled steps sorted by canonical rank, list order kept within a rank.
    pub fn steps_in_processing_order(&self) -> Vec<&Step> {
        let mut steps = self.enabled_steps();
        steps.sort_by_key(|s| s.processor.info().canonical_rank);
        steps
    }

    pub fn task_type(&self) -> TaskType {
        self.metadata.category
    }

    pub fn estimate_output_count(&self) -> usize {
        self.metadata.estimated_outputs
    }

    // ------------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------------

    /// Validate every enabled step, then the step ordering.
    pub fn validate(&mut self, image: Option<&SubjectImage>) -> ValidationResult {
        self.run_validation(image, None)
    }

    /// Like [`validate`](Self::validate), additionally checking that AI crop
    /// modes are backed by a detector. The probe is consulted at most once,
    /// and only when an enabled crop step uses an AI mode.
    pub fn validate_with_probe(
        &mut self,
        image: Option<&SubjectImage>,
        probe: &dyn CapabilityProbe,
    ) -> ValidationResult {
        let needs_probe = self.enabled_steps().iter().any(|s| s.uses_smart_crop());
        let capabilities = needs_probe.then(|| probe.detect_capabilities());
        self.run_validation(image, capabilities)
    }

    fn run_validation(
        &mut self,
        image: Option<&SubjectImage>,
        capabilities: Option<Capabilities>,
    ) -> ValidationResult {
        let mut result = ValidationResult::new();
        let enabled = self.enabled_steps();

        if enabled.is_empty() {
            result.push(
                ValidationMessage::warning(codes::EMPTY_TASK, "Task has no enabled steps")
                    .with_suggestion("Add at least one processing step"),
            );
        }

        for step in &enabled {
            result.absorb(validate_step(&step.options, image), Some(step.order));

            if let Some(caps) = capabilities
                && let StepOptions::Crop(crop) = &step.options
                && crop.mode.is_ai()
                && !caps.supports(crop.mode)
            {
                result.push(
                    ValidationMessage::warning(
                        codes::AI_CAPABILITY_UNAVAILABLE,
                        format!(
                            "No detector available for '{}' crop; a centre crop will be used",
                            crop.mode.as_str()
                        ),
                    )
                    .with_suggestion("Use an anchored crop mode such as 'center'")
                    .at_step(step.order),
                );
            }
        }

        for message in validate_ordering(&enabled) {
            result.push(message);
        }

        tracing::debug!(
            task = %self.id,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "validated task"
        );
        self.last_validation = result.clone();
        self.validation_current = true;
        result
    }

    /// Summary of the cached validation plus current metadata.
    pub fn validation_summary(&self) -> ValidationSummary {
        let v = &self.last_validation;
        let status = if !v.errors.is_empty() {
            ValidationStatus::Invalid
        } else if !v.warnings.is_empty() {
            ValidationStatus::HasWarnings
        } else {
            ValidationStatus::Valid
        };
        ValidationSummary {
            total_steps: self.steps.len(),
            enabled_steps: self.steps.iter().filter(|s| s.enabled).count(),
            error_count: v.errors.len(),
            warning_count: v.warnings.len(),
            info_count: v
                .warnings
                .iter()
                .filter(|m| m.severity == Severity::Info)
                .count(),
            task_type: self.metadata.category,
            status,
            can_proceed: v.errors.is_empty(),
            estimated_outputs: self.metadata.estimated_outputs,
            estimated_duration: format_duration(self.metadata.estimated_duration),
            has_smart_crop: self.metadata.has_smart_crop,
            has_auto_optimization: self.metadata.has_auto_optimization,
        }
    }

    pub fn time_estimate(&self, image_count: usize) -> TimeEstimate {
        let steps: Vec<StepCost> = self
            .steps_in_processing_order()
            .into_iter()
            .map(|s| StepCost {
                order: s.order,
                processor: s.processor,
                cost: s.cost(),
            })
            .collect();
        let per_image: u64 = steps.iter().map(|s| s.cost).sum();
        let total = per_image * image_count as u64;
        TimeEstimate {
            per_image,
            total,
            formatted: format_duration(total),
            steps,
        }
    }
}
