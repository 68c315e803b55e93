//! Processor kinds and their static descriptions.
//!
//! Per-kind facts (display name, relative cost, canonical execution rank)
//! are plain data in [`PROCESSORS`], looked up through
//! [`ProcessorKind::info`]. Nothing here has behaviour of its own.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The six recognised step kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorKind {
    Resize,
    Crop,
    Optimize,
    Rename,
    Template,
    Favicon,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown processor kind '{0}' (expected one of: resize, crop, optimize, rename, template, favicon)")]
pub struct UnknownProcessor(pub String);

/// What a step produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputType {
    /// Transformed pixels, one image in, one image out.
    Image,
    /// Same pixels, new encoding (possibly several formats).
    Encoded,
    /// Only the output file name changes.
    FileName,
    /// A set of icon files plus optional manifest/HTML.
    FaviconSet,
}

/// Static per-kind description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorInfo {
    pub kind: ProcessorKind,
    pub name: &'static str,
    pub description: &'static str,
    /// Relative time units per image, before complexity factors.
    pub base_cost: u64,
    /// Position in canonical processing order (lower runs first).
    pub canonical_rank: u8,
    pub output_type: OutputType,
    /// Whether the step applies per image in a batch (favicon sets do not).
    pub batchable: bool,
}

pub const PROCESSORS: [ProcessorInfo; 6] = [
    ProcessorInfo {
        kind: ProcessorKind::Resize,
        name: "Resize",
        description: "Scale an image to a target edge length, preserving aspect ratio",
        base_cost: 100,
        canonical_rank: 0,
        output_type: OutputType::Image,
        batchable: true,
    },
    ProcessorInfo {
        kind: ProcessorKind::Crop,
        name: "Crop",
        description: "Cut a fixed-size region, optionally placed by subject detection",
        base_cost: 150,
        canonical_rank: 1,
        output_type: OutputType::Image,
        batchable: true,
    },
    ProcessorInfo {
        kind: ProcessorKind::Optimize,
        name: "Optimize",
        description: "Re-encode to one or more web formats at a chosen quality",
        base_cost: 200,
        canonical_rank: 3,
        output_type: OutputType::Encoded,
        batchable: true,
    },
    ProcessorInfo {
        kind: ProcessorKind::Rename,
        name: "Rename",
        description: "Name outputs from a placeholder pattern",
        base_cost: 10,
        canonical_rank: 5,
        output_type: OutputType::FileName,
        batchable: true,
    },
    ProcessorInfo {
        kind: ProcessorKind::Template,
        name: "Template",
        description: "Fit an image to a catalogued platform template",
        base_cost: 300,
        canonical_rank: 2,
        output_type: OutputType::Image,
        batchable: true,
    },
    ProcessorInfo {
        kind: ProcessorKind::Favicon,
        name: "Favicon",
        description: "Generate a favicon set with optional web manifest and HTML",
        base_cost: 500,
        canonical_rank: 4,
        output_type: OutputType::FaviconSet,
        batchable: false,
    },
];

impl ProcessorKind {
    pub const ALL: [ProcessorKind; 6] = [
        Self::Resize,
        Self::Crop,
        Self::Optimize,
        Self::Rename,
        Self::Template,
        Self::Favicon,
    ];

    pub fn info(self) -> &'static ProcessorInfo {
        &PROCESSORS[self as usize]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resize => "resize",
            Self::Crop => "crop",
            Self::Optimize => "optimize",
            Self::Rename => "rename",
            Self::Template => "template",
            Self::Favicon => "favicon",
        }
    }

    /// Resize and crop change pixel geometry; favicon preparation needs one.
    pub fn is_geometric(self) -> bool {
        matches!(self, Self::Resize | Self::Crop)
    }
}

impl FromStr for ProcessorKind {
    type Err = UnknownProcessor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == lower)
            .ok_or_else(|| UnknownProcessor(s.to_string()))
    }
}

impl fmt::Display for ProcessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_indexed_by_discriminant() {
        for kind in ProcessorKind::ALL {
            assert_eq!(kind.info().kind, kind);
        }
    }

    #[test]
    fn parse_known_kinds_case_insensitive() {
        assert_eq!("resize".parse(), Ok(ProcessorKind::Resize));
        assert_eq!("Favicon".parse(), Ok(ProcessorKind::Favicon));
        assert_eq!(" crop ".parse(), Ok(ProcessorKind::Crop));
    }

    #[test]
    fn parse_unknown_kind_fails() {
        let err = "sharpen".parse::<ProcessorKind>().unwrap_err();
        assert_eq!(err, UnknownProcessor("sharpen".into()));
        assert!(err.to_string().contains("sharpen"));
    }

    #[test]
    fn canonical_ranks_put_rename_last() {
        let mut kinds = ProcessorKind::ALL;
        kinds.sort_by_key(|k| k.info().canonical_rank);
        assert_eq!(kinds.first(), Some(&ProcessorKind::Resize));
        assert_eq!(kinds.last(), Some(&ProcessorKind::Rename));
        let crop = kinds.iter().position(|k| *k == ProcessorKind::Crop);
        let optimize = kinds.iter().position(|k| *k == ProcessorKind::Optimize);
        assert!(crop < optimize);
    }

    #[test]
    fn base_costs() {
        let costs: Vec<u64> = ProcessorKind::ALL.iter().map(|k| k.info().base_cost).collect();
        assert_eq!(costs, vec![100, 150, 200, 10, 300, 500]);
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&ProcessorKind::Optimize).unwrap();
        assert_eq!(json, "\"optimize\"");
    }
}
