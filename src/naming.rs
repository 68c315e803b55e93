//! Output file naming for the rename step.
//!
//! A rename pattern is plain text with placeholders:
//!
//! | Placeholder | Value |
//! |---|---|
//! | `{name}` | source file stem (`dawn` for `photos/dawn.jpg`) |
//! | `{index}` | `startIndex` + position in the batch, optionally zero-padded |
//! | `{timestamp}` | run start, `YYYYMMDDHHMMSS` UTC |
//! | `{width}` / `{height}` | output pixel size |
//! | `{dimensions}` | `{width}x{height}` |
//!
//! Unknown `{...}` sequences are left as they are. Characters that are not
//! allowed in file names are replaced with `-` after expansion.

use crate::options::RenameOptions;
use crate::step_validator::FORBIDDEN_FILENAME_CHARS;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Values available to a rename pattern for one image.
#[derive(Debug, Clone)]
pub struct NameContext<'a> {
    pub name: &'a str,
    /// 0-based position of the image in its batch.
    pub position: usize,
    pub width: u32,
    pub height: u32,
    pub timestamp: DateTime<Utc>,
}

/// File stem of a path-like name, or the whole input when it has none.
pub fn source_stem(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| filename.to_string())
}

/// Expand `options.pattern` for one image. The result has no extension.
pub fn expand_pattern(options: &RenameOptions, ctx: &NameContext<'_>) -> String {
    let index = options.start_index + ctx.position as i64;
    let width = options.zero_pad as usize;
    let index = if index < 0 {
        format!("-{:0>width$}", index.unsigned_abs())
    } else {
        format!("{index:0>width$}")
    };

    let expanded = options
        .pattern
        .replace("{name}", ctx.name)
        .replace("{index}", &index)
        .replace("{timestamp}", &ctx.timestamp.format("%Y%m%d%H%M%S").to_string())
        .replace("{dimensions}", &format!("{}x{}", ctx.width, ctx.height))
        .replace("{width}", &ctx.width.to_string())
        .replace("{height}", &ctx.height.to_string());

    let cleaned = sanitize(&expanded);
    if options.lowercase {
        cleaned.to_lowercase()
    } else {
        cleaned
    }
}

/// Replace characters that cannot appear in a file name.
pub fn sanitize(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if FORBIDDEN_FILENAME_CHARS.contains(&c) || c.is_control() {
                '-'
            } else {
                c
            }
        })
        .collect();
    let trimmed = replaced.trim().trim_matches('.');
    if trimmed.is_empty() {
        "image".to_string()
    } else {
        trimmed.to_string()
    }
}
