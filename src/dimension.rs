//! Width/height values that may be fixed or symbolic.
//!
//! Template catalogs and user input express dimensions either as a number
//! (`1080`, `"1080px"`) or as a marker meaning "decided at execution time"
//! (`"auto"`, `"flex"`, `"{height}"`). [`DimensionValue::parse`] turns any of
//! these into one of three states:
//!
//! | State | `value` | `is_variable` |
//! |---|---|---|
//! | Fixed | `Some(n)` | `false` |
//! | Variable | `None` | `true` |
//! | Invalid | `None` | `false` |
//!
//! Invalid is deliberately distinct from variable: callers must report it,
//! never coerce it to zero.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Words that mark a dimension as flexible when they make up the whole input.
const VARIABLE_WORDS: &[&str] = &["auto", "flex", "variable", "natural"];

/// Substrings that mark a dimension as flexible anywhere in the input.
const VARIABLE_MARKERS: &[&str] = &["{", "*", "variable", "flexible"];

/// Raw dimension input: either a number or free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DimensionInput {
    Number(f64),
    Text(String),
}

impl From<u32> for DimensionInput {
    fn from(n: u32) -> Self {
        Self::Number(n as f64)
    }
}

impl From<i64> for DimensionInput {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for DimensionInput {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl fmt::Display for DimensionInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// A parsed width or height.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionValue {
    /// The input exactly as given.
    pub raw: DimensionInput,
    /// Fixed pixel value, if any.
    pub value: Option<f64>,
    /// True for symbolic/flexible dimensions.
    pub is_variable: bool,
    /// Trailing unit text for textual input (`"px"` in `"1080px"`), else `"px"`.
    pub unit: String,
}

impl DimensionValue {
    /// Parse any dimension input. Pure and total: never panics, never errors.
    pub fn parse(input: impl Into<DimensionInput>) -> Self {
        let raw = input.into();
        match &raw {
            DimensionInput::Number(n) => Self {
                value: Some(*n),
                is_variable: false,
                unit: "px".to_string(),
                raw,
            },
            DimensionInput::Text(text) => {
                let trimmed = text.trim();
                let lower = trimmed.to_ascii_lowercase();

                if VARIABLE_WORDS.contains(&lower.as_str())
                    || VARIABLE_MARKERS.iter().any(|m| lower.contains(m))
                {
                    return Self {
                        value: None,
                        is_variable: true,
                        unit: String::new(),
                        raw,
                    };
                }

                let digits_end = trimmed
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(trimmed.len());
                match trimmed[..digits_end].parse::<u64>() {
                    Ok(n) => {
                        let unit = trimmed[digits_end..].trim();
                        Self {
                            value: Some(n as f64),
                            is_variable: false,
                            unit: if unit.is_empty() { "px" } else { unit }.to_string(),
                            raw,
                        }
                    }
                    Err(_) => Self {
                        value: None,
                        is_variable: false,
                        unit: String::new(),
                        raw,
                    },
                }
            }
        }
    }

    pub fn is_fixed(&self) -> bool {
        self.value.is_some()
    }

    /// Neither a fixed value nor a variable marker.
    pub fn is_invalid(&self) -> bool {
        self.value.is_none() && !self.is_variable
    }

    /// Fixed value as whole pixels, when it is a positive number.
    pub fn pixels(&self) -> Option<u32> {
        self.value
            .filter(|v| *v > 0.0 && *v <= u32::MAX as f64)
            .map(|v| v.round() as u32)
    }
}

impl fmt::Display for DimensionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.value, self.is_variable) {
            (Some(v), _) => write!(f, "{v}{}", self.unit),
            (None, true) => f.write_str("variable"),
            (None, false) => write!(f, "invalid ({})", self.raw),
        }
    }
}
