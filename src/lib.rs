//! # imgpipe
//!
//! Batch image-processing tasks: an ordered list of resize, crop, template,
//! optimize, favicon and rename steps that is validated before it runs,
//! serialized as JSON, and executed over many images in parallel.
//!
//! # Architecture: Describe, Validate, Execute
//!
//! ```text
//! 1. Describe   Task + steps      (options resolved: built-in → imgpipe.toml → task file)
//! 2. Validate   per step + order  →  ValidationResult, ValidationSummary
//! 3. Execute    canonical order   →  encoded images, favicon sets, manifests
//! ```
//!
//! Only the last stage touches pixels. Everything before it is pure data, so
//! a task can be built, validated, estimated and saved without any image
//! decoder involved.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`task`] | The `Task` aggregate: step list, mutation, metadata, summaries, time estimates |
//! | [`processors`] | Closed set of step kinds with cost, rank and output type |
//! | [`options`] | Typed options per kind and the layered `OptionResolver` |
//! | [`step_validator`] | Per-step checks, optionally against a source image |
//! | [`logic`] | Rules about how steps combine and in what order |
//! | [`validation`] | `ValidationMessage`, `ValidationResult`, stable message codes |
//! | [`capabilities`] | Source image facts, AI capability probing, subject detection seam |
//! | [`templates`] | Built-in social/web size templates |
//! | [`dimension`] | Parsing of template dimension strings (`"1080"`, `"auto"`, ...) |
//! | [`naming`] | Rename pattern expansion and filename sanitizing |
//! | [`serializer`] | Versioned JSON import/export, cloning, instantiating |
//! | [`config`] | `imgpipe.toml` loading, validation and merging |
//! | [`imaging`] | Geometry calculations and the raster backend (`image` crate) |
//! | [`execute`] | Runs a task over images, in parallel with rayon |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Canonical Processing Order
//!
//! Users list steps in any order; execution always follows
//! resize → crop → template → optimize → favicon → rename. The list order is
//! kept for display and for `order` numbers in validation messages, and the
//! ordering rules in [`logic`] warn when the list reads differently from how
//! it will run.
//!
//! ## Errors Block, Warnings Inform
//!
//! A task with any error-level message cannot run. Warnings and infos never
//! block unless `[execution] block_on_warnings` is set. Validation is cached
//! on the task and goes stale on mutation; call `validate` again before
//! reading the summary. Execution refuses a task whose validation is stale.
//!
//! ## Pure-Rust Imaging
//!
//! The [`imaging`] module uses the `image` crate for decoding, Lanczos3
//! resampling and encoding (AVIF through rav1e). No system libraries are
//! needed.

pub mod capabilities;
pub mod config;
pub mod dimension;
pub mod execute;
pub mod imaging;
pub mod logic;
pub mod naming;
pub mod options;
pub mod output;
pub mod processors;
pub mod serializer;
pub mod step_validator;
pub mod task;
pub mod templates;
pub mod validation;
