//! Task export/import as plain JSON-friendly data.
//!
//! The exported shape:
//!
//! ```text
//! { id, name, description, version,
//!   steps: [ {id, processor, options, enabled, order, metadata, addedAt} ... ],
//!   metadata, createdAt, updatedAt,
//!   validation: { errors, warnings } }     # omitted when stale
//! ```
//!
//! Import is forgiving about what it reads: missing ids get fresh ones,
//! `order` is recomputed from array position, and options are resolved
//! again so stored configs written by older versions pick up current
//! defaults and normalization. An unknown processor kind or a newer
//! `version` is a hard error.

use crate::options::OptionResolver;
use crate::processors::{ProcessorKind, UnknownProcessor};
use crate::task::{Step, StepMetadata, Task, TaskMetadata, new_id};
use crate::validation::ValidationResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

/// Current export format version.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum SerializeError {
    #[error("failed to read or write task file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid task JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("task format version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error(transparent)]
    InvalidProcessorKind(#[from] UnknownProcessor),
}

fn default_version() -> u32 {
    FORMAT_VERSION
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Kind name; kept as text so an unknown kind reports as such.
    pub processor: String,
    #[serde(default)]
    pub options: Value,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Informational only; import uses array position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<StepMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub steps: Vec<StepConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TaskMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Present only when the task was validated after its last change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResult>,
}

impl TaskConfig {
    /// Drop every id so the next import assigns fresh ones.
    pub fn without_ids(mut self) -> Self {
        self.id = None;
        for step in &mut self.steps {
            step.id = None;
        }
        self
    }
}

pub fn export(task: &Task) -> TaskConfig {
    TaskConfig {
        id: Some(task.id.clone()),
        name: task.name.clone(),
        description: task.description.clone(),
        version: FORMAT_VERSION,
        steps: task
            .steps()
            .iter()
            .map(|s| StepConfig {
                id: Some(s.id.clone()),
                processor: s.processor.as_str().to_string(),
                options: s.options.to_value(),
                enabled: s.enabled,
                order: Some(s.order),
                metadata: Some(s.metadata),
                added_at: Some(s.added_at),
            })
            .collect(),
        metadata: Some(task.metadata().clone()),
        created_at: Some(task.created_at),
        updated_at: Some(task.updated_at),
        validation: task
            .has_current_validation()
            .then(|| task.last_validation().clone()),
    }
}

/// Import with built-in option defaults.
pub fn import(config: TaskConfig) -> Result<Task, SerializeError> {
    import_with(config, OptionResolver::new())
}

/// Import, resolving step options through `resolver`.
pub fn import_with(config: TaskConfig, resolver: OptionResolver) -> Result<Task, SerializeError> {
    if config.version > FORMAT_VERSION {
        return Err(SerializeError::UnsupportedVersion {
            found: config.version,
            supported: FORMAT_VERSION,
        });
    }

    let mut task = Task::new(config.name)
        .with_description(config.description)
        .with_resolver(resolver);
    if let Some(id) = config.id {
        task.id = id;
    }

    for step_config in config.steps {
        let kind: ProcessorKind = step_config.processor.parse()?;
        let options = task.resolver().resolve(kind, &step_config.options);
        let mut step = Step::new(options, 0);
        if let Some(id) = step_config.id {
            step.id = id;
        }
        if let Some(added_at) = step_config.added_at {
            step.added_at = added_at;
        }
        step.enabled = step_config.enabled;
        task.push_step(step);
    }

    if let Some(created_at) = config.created_at {
        task.created_at = created_at;
    }
    if let Some(updated_at) = config.updated_at {
        task.updated_at = updated_at;
    }
    if let Some(validation) = config.validation {
        task.restore_validation(validation);
    }
    tracing::debug!(task = %task.id, steps = task.steps().len(), "imported task");
    Ok(task)
}

/// Independent copy with fresh ids and timestamps.
pub fn clone_task(task: &Task) -> Result<Task, SerializeError> {
    let mut config = export(task).without_ids();
    config.name = format!("{} (copy)", task.name);
    config.created_at = None;
    config.updated_at = None;
    import_with(config, task.resolver().clone())
}

/// Build a new task from a stored config used as a template, resolving its
/// options through `resolver`.
pub fn instantiate(
    config: &TaskConfig,
    name: &str,
    resolver: OptionResolver,
) -> Result<Task, SerializeError> {
    let mut config = config.clone().without_ids();
    config.name = name.to_string();
    config.created_at = None;
    config.updated_at = None;
    config.validation = None;
    let mut task = import_with(config, resolver)?;
    task.id = new_id();
    Ok(task)
}

pub fn to_json(task: &Task) -> Result<String, SerializeError> {
    Ok(serde_json::to_string_pretty(&export(task))?)
}

pub fn from_json(json: &str) -> Result<Task, SerializeError> {
    import(serde_json::from_str(json)?)
}

pub fn save(task: &Task, path: &Path) -> Result<(), SerializeError> {
    std::fs::write(path, to_json(task)?)?;
    Ok(())
}

/// Read a task file, resolving options through `resolver`.
pub fn load(path: &Path, resolver: OptionResolver) -> Result<Task, SerializeError> {
    let content = std::fs::read_to_string(path)?;
    import_with(serde_json::from_str(&content)?, resolver)
}
