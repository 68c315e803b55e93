//! Cross-step checks over the enabled step sequence.
//!
//! Ordering problems are advisory: [`validate_ordering`] only ever produces
//! warnings and info messages. Every rule is evaluated independently on the
//! same input, so several can fire in one pass.
//!
//! 1. crop without any resize (info)
//! 2. more than one optimize step
//! 3. rename outside the last two positions (info)
//! 4. favicon with no resize or crop before it
//! 5. optimize after a favicon step
//! 6. optimize with neither resize nor crop anywhere (info)

use crate::processors::ProcessorKind;
use crate::task::Step;
use crate::validation::{ValidationMessage, codes};

/// Check an ordered, enabled-only step sequence.
pub fn validate_ordering(steps: &[&Step]) -> Vec<ValidationMessage> {
    let mut out = Vec::new();
    let has = |kind: ProcessorKind| steps.iter().any(|s| s.processor == kind);
    let has_resize = has(ProcessorKind::Resize);
    let has_crop = has(ProcessorKind::Crop);

    if has_crop && !has_resize {
        out.push(
            ValidationMessage::info(
                codes::CROP_WITHOUT_RESIZE,
                "Crop without resize may produce unexpected output on large sources",
            )
            .with_suggestion("Add a resize step before cropping"),
        );
    }

    let optimize_orders: Vec<usize> = steps
        .iter()
        .filter(|s| s.processor == ProcessorKind::Optimize)
        .map(|s| s.order)
        .collect();
    if optimize_orders.len() > 1 {
        out.push(
            ValidationMessage::warning(
                codes::MULTIPLE_OPTIMIZE,
                format!(
                    "{} optimize steps will re-encode repeatedly and degrade quality",
                    optimize_orders.len()
                ),
            )
            .with_suggestion("Keep a single optimize step"),
        );
    }

    for (index, step) in steps.iter().enumerate() {
        if step.processor == ProcessorKind::Rename && index + 2 < steps.len() {
            out.push(
                ValidationMessage::info(
                    codes::RENAME_NOT_LAST,
                    "Rename placed early; consider moving it to the end",
                )
                .at_step(step.order),
            );
        }
    }

    for (index, step) in steps.iter().enumerate() {
        if step.processor != ProcessorKind::Favicon {
            continue;
        }
        let prepared = steps[..index].iter().any(|s| s.processor.is_geometric());
        if !prepared {
            out.push(
                ValidationMessage::warning(
                    codes::FAVICON_WITHOUT_PREPARATION,
                    "Favicon generated without a preceding resize or crop",
                )
                .with_suggestion("Crop to a square before generating favicons")
                .at_step(step.order),
            );
        }
        if optimize_orders.iter().any(|&o| o > step.order) {
            out.push(
                ValidationMessage::warning(
                    codes::OPTIMIZE_AFTER_FAVICON,
                    "Optimize after favicon may affect favicon quality",
                )
                .with_suggestion("Move the optimize step before the favicon step")
                .at_step(step.order),
            );
        }
    }

    if !optimize_orders.is_empty() && !has_resize && !has_crop {
        out.push(ValidationMessage::info(
            codes::OPTIMIZATION_ONLY,
            "Task only re-encodes images without resizing or cropping",
        ));
    }

    out
}
