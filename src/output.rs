//! CLI output formatting for every command.
//!
//! Output is step-centric: each line leads with the step's 3-digit `order`
//! and kind, with detail indented beneath it.
//!
//! # Output Format
//!
//! ## Task listing
//!
//! ```text
//! Task: Web set (full_processing)
//!     001 resize: 1200px longest
//!     002 crop: 800x800 smart
//!     003 optimize: webp, avif @ 82
//!     004 rename: {name}-{index} [disabled]
//! ```
//!
//! ## Validation
//!
//! ```text
//! Validation: has_warnings (0 errors, 1 warning)
//!     warning [high_quality] step 003: Quality 98 produces large files
//!         Suggestion: Use 80-90 for web delivery
//! ```
//!
//! ## Run
//!
//! ```text
//! Running Web set on 2 images
//! dawn.jpg 001 resize → 1200x800
//! dawn.jpg 002 crop → 800x800 (subjects kept: 97%)
//! 001 dawn.jpg
//!     → dawn.webp
//! 002 (broken.png) failed: cannot read broken.png: ...
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure.

use crate::execute::ExecuteEvent;
use crate::options::StepOptions;
use crate::task::{Step, Task, TimeEstimate, ValidationSummary};
use crate::validation::ValidationResult;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based position as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

/// One-line description of what a step will do.
fn step_detail(options: &StepOptions) -> String {
    match options {
        StepOptions::Resize(o) => {
            let mut s = format!("{}px {}", o.dimension, o.mode.as_str());
            if o.upscale {
                s.push_str(" upscale");
            }
            if o.force_square {
                s.push_str(" square");
            }
            s
        }
        StepOptions::Crop(o) => format!("{}x{} {}", o.width, o.height, o.mode.as_str()),
        StepOptions::Optimize(o) => {
            format!("{} @ {}", o.format.formats().join(", "), o.quality)
        }
        StepOptions::Rename(o) => o.pattern.clone(),
        StepOptions::Favicon(o) => {
            let sizes: Vec<String> = o.sizes.iter().map(|s| s.to_string()).collect();
            format!("{} as {}", sizes.join(", "), o.formats.join(", "))
        }
        StepOptions::Template(o) => o.template_id.clone().unwrap_or_else(|| "(none)".into()),
    }
}

fn step_line(step: &Step) -> String {
    let mut line = format!(
        "{} {}: {}",
        format_index(step.order),
        step.processor,
        step_detail(&step.options)
    );
    if !step.enabled {
        line.push_str(" [disabled]");
    }
    line
}

// ============================================================================
// Task listing
// ============================================================================

pub fn format_task(task: &Task) -> Vec<String> {
    let mut lines = vec![format!("Task: {} ({})", task.name, task.task_type())];
    if !task.description.is_empty() {
        lines.push(format!("{}{}", indent(1), task.description));
    }
    if task.steps().is_empty() {
        lines.push(format!("{}(no steps)", indent(1)));
    }
    for step in task.steps() {
        lines.push(format!("{}{}", indent(1), step_line(step)));
    }
    lines
}

pub fn print_task(task: &Task) {
    for line in format_task(task) {
        println!("{}", line);
    }
}

// ============================================================================
// Validation
// ============================================================================

pub fn format_validation_report(result: &ValidationResult) -> Vec<String> {
    let status = if !result.errors.is_empty() {
        "invalid"
    } else if !result.warnings.is_empty() {
        "has_warnings"
    } else {
        "valid"
    };
    let mut lines = vec![format!(
        "Validation: {} ({}, {})",
        status,
        plural(result.errors.len(), "error"),
        plural(result.warnings.len(), "warning")
    )];
    for message in result.messages() {
        let location = message
            .step
            .map(|order| format!(" step {}", format_index(order)))
            .unwrap_or_default();
        lines.push(format!(
            "{}{} [{}]{}: {}",
            indent(1),
            message.severity,
            message.code,
            location,
            message.message
        ));
        if let Some(suggestion) = &message.suggestion {
            lines.push(format!("{}Suggestion: {}", indent(2), suggestion));
        }
    }
    lines
}

pub fn print_validation_report(result: &ValidationResult) {
    for line in format_validation_report(result) {
        println!("{}", line);
    }
}

pub fn format_summary(summary: &ValidationSummary) -> Vec<String> {
    let proceed = if summary.can_proceed {
        "can proceed"
    } else {
        "blocked"
    };
    vec![
        "Summary".to_string(),
        format!("{}Type: {}", indent(1), summary.task_type),
        format!(
            "{}Steps: {} of {} enabled",
            indent(1),
            summary.enabled_steps,
            summary.total_steps
        ),
        format!("{}Status: {} ({})", indent(1), summary.status, proceed),
        format!(
            "{}Outputs per image: {}",
            indent(1),
            summary.estimated_outputs
        ),
        format!("{}Estimated time: {}", indent(1), summary.estimated_duration),
        format!("{}Smart crop: {}", indent(1), yes_no(summary.has_smart_crop)),
        format!(
            "{}Auto format: {}",
            indent(1),
            yes_no(summary.has_auto_optimization)
        ),
    ]
}

pub fn print_summary(summary: &ValidationSummary) {
    for line in format_summary(summary) {
        println!("{}", line);
    }
}

// ============================================================================
// Estimate
// ============================================================================

pub fn format_estimate(estimate: &TimeEstimate, image_count: usize) -> Vec<String> {
    let mut lines = vec![format!("Estimate for {}", plural(image_count, "image"))];
    for step in &estimate.steps {
        lines.push(format!(
            "{}{} {}: {}",
            indent(1),
            format_index(step.order),
            step.processor,
            step.cost
        ));
    }
    lines.push(format!("{}Per image: {}", indent(1), estimate.per_image));
    lines.push(format!(
        "{}Total: {} ({})",
        indent(1),
        estimate.total,
        estimate.formatted
    ));
    lines
}

pub fn print_estimate(estimate: &TimeEstimate, image_count: usize) {
    for line in format_estimate(estimate, image_count) {
        println!("{}", line);
    }
}

// ============================================================================
// Run
// ============================================================================

/// Format a single execution event.
pub fn format_execute_event(event: &ExecuteEvent) -> Vec<String> {
    match event {
        ExecuteEvent::BatchStarted { task, images } => {
            vec![format!("Running {} on {}", task, plural(*images, "image"))]
        }
        ExecuteEvent::StepApplied {
            source,
            order,
            processor,
            width,
            height,
            preservation,
        } => {
            let mut line = format!(
                "{} {} {} \u{2192} {}x{}",
                source,
                format_index(*order),
                processor,
                width,
                height
            );
            if let Some(p) = preservation {
                line.push_str(&format!(" (subjects kept: {:.0}%)", p));
            }
            vec![line]
        }
        ExecuteEvent::ImageFinished {
            position,
            source,
            files,
        } => {
            let mut lines = vec![format!("{} {}", format_index(position + 1), source)];
            for file in files {
                lines.push(format!("{}\u{2192} {}", indent(1), file));
            }
            lines
        }
        ExecuteEvent::ImageFailed {
            position,
            source,
            error,
        } => vec![format!(
            "{} ({}) failed: {}",
            format_index(position + 1),
            source,
            error
        )],
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::ProcessorKind;
    use crate::validation::{ValidationMessage, codes};
    use serde_json::json;

    fn web_task() -> Task {
        let mut task = Task::new("Web set");
        task.add_step("resize", json!({"dimension": 1200})).unwrap();
        task.add_step("crop", json!({"width": 800, "height": 800, "mode": "smart"}))
            .unwrap();
        task.add_step("optimize", json!({"format": ["webp", "avif"], "quality": 82}))
            .unwrap();
        task.add_step("rename", json!({"pattern": "{name}-{index}"}))
            .unwrap();
        task.set_step_enabled(3, false);
        task
    }

    #[test]
    fn task_listing() {
        let lines = format_task(&web_task());
        assert_eq!(
            lines,
            vec![
                "Task: Web set (full_processing)",
                "    001 resize: 1200px longest",
                "    002 crop: 800x800 smart",
                "    003 optimize: webp, avif @ 82",
                "    004 rename: {name}-{index} [disabled]",
            ]
        );
    }

    #[test]
    fn empty_task_listing() {
        let lines = format_task(&Task::new("Nothing"));
        assert_eq!(lines[1], "    (no steps)");
    }

    #[test]
    fn validation_report_lists_messages() {
        let mut result = ValidationResult::new();
        result.push(
            ValidationMessage::warning(codes::HIGH_QUALITY, "Quality 98 produces large files")
                .with_suggestion("Use 80-90 for web delivery")
                .at_step(3),
        );
        let lines = format_validation_report(&result);
        assert_eq!(
            lines,
            vec![
                "Validation: has_warnings (0 errors, 1 warning)",
                "    warning [high_quality] step 003: Quality 98 produces large files",
                "        Suggestion: Use 80-90 for web delivery",
            ]
        );
    }

    #[test]
    fn validation_report_valid() {
        let lines = format_validation_report(&ValidationResult::new());
        assert_eq!(lines, vec!["Validation: valid (0 errors, 0 warnings)"]);
    }

    #[test]
    fn summary_lines() {
        let mut task = web_task();
        task.validate(None);
        let lines = format_summary(&task.validation_summary());
        assert_eq!(lines[0], "Summary");
        assert_eq!(lines[1], "    Type: full_processing");
        assert_eq!(lines[2], "    Steps: 3 of 4 enabled");
        assert!(lines[3].ends_with("(can proceed)"));
        assert_eq!(lines[6], "    Smart crop: yes");
    }

    #[test]
    fn estimate_lines() {
        let task = web_task();
        let estimate = task.time_estimate(1);
        let lines = format_estimate(&estimate, 1);
        assert_eq!(lines[0], "Estimate for 1 image");
        assert!(lines[1].starts_with("    001 resize: "));
        assert!(lines.last().unwrap().contains(&estimate.formatted));
    }

    #[test]
    fn step_event_with_preservation() {
        let lines = format_execute_event(&ExecuteEvent::StepApplied {
            source: "dawn.jpg".into(),
            order: 2,
            processor: ProcessorKind::Crop,
            width: 800,
            height: 800,
            preservation: Some(96.6),
        });
        assert_eq!(
            lines,
            vec!["dawn.jpg 002 crop \u{2192} 800x800 (subjects kept: 97%)"]
        );
    }

    #[test]
    fn finished_event_lists_files() {
        let lines = format_execute_event(&ExecuteEvent::ImageFinished {
            position: 0,
            source: "dawn.jpg".into(),
            files: vec!["dawn.webp".into(), "dawn/favicon-16x16.png".into()],
        });
        assert_eq!(
            lines,
            vec![
                "001 dawn.jpg",
                "    \u{2192} dawn.webp",
                "    \u{2192} dawn/favicon-16x16.png",
            ]
        );
    }

    #[test]
    fn failed_event() {
        let lines = format_execute_event(&ExecuteEvent::ImageFailed {
            position: 4,
            source: "broken.png".into(),
            error: "bad data".into(),
        });
        assert_eq!(lines, vec!["005 (broken.png) failed: bad data"]);
    }

    #[test]
    fn batch_started_event() {
        let lines = format_execute_event(&ExecuteEvent::BatchStarted {
            task: "Web set".into(),
            images: 2,
        });
        assert_eq!(lines, vec!["Running Web set on 2 images"]);
    }
}
