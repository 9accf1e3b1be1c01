//! # Image Autoresize
//!
//! Shrinks oversized images at upload time. Files that land in configured
//! directories and exceed a size threshold are resized to fit a bounding
//! box, optionally converted to another format (`bmp => jpg`), stripped of
//! metadata and auto-oriented. A running total of reclaimed storage is kept.
//!
//! # Flow
//!
//! ```text
//! host upload pipeline
//!   │  sanitize_file_name / pre_file_add / post_file_replace
//!   ▼
//! upload::UploadInterceptor ── storage → physical directory, temp file staging
//!   │
//!   ▼
//! resizer::ImageResizer ────── rule lookup, threshold, identify, resize, rename
//!   │                 │
//!   ▼                 ▼
//! imaging backend    statistics file, notifier
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `image-autoresize.toml` loading, merging over stock defaults, validation |
//! | [`rules`] | Typed rules: directory patterns, thresholds, conversion mapping, matching |
//! | [`resizer`] | The decision engine: evaluate one file, produce a [`resizer::ResizeOutcome`] |
//! | [`upload`] | Upload lifecycle hooks and the storage abstraction |
//! | [`imaging`] | Backends: ImageMagick/GraphicsMagick subprocess or the pure-Rust `image` crate |
//! | [`notify`] | Severity-leveled user notifications |
//! | [`statistics`] | Persistent resized-image / bytes-saved counters |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Never Break an Upload
//!
//! Resizing is an optimisation. [`resizer::ImageResizer::evaluate`] has no
//! error type: a missing tool, an unreadable image or a full disk is reported
//! through the [`notify::Notifier`] and the upload continues with the file as
//! it was.
//!
//! ## Explicit Values, No Globals
//!
//! The resizer is constructed once from a [`rules::RuleSet`] and a backend and
//! passed by reference. State that has to survive between two upload hooks
//! (the name the user asked for before it was sanitized) travels as a return
//! value ([`upload::SanitizedName`]), not through a shared slot.
//!
//! ## External Tool by Default
//!
//! ImageMagick reads far more formats than the pure-Rust decoders (`ai`,
//! `pcx`, CMYK TIFF), so it is the default. The builtin backend is there for
//! hosts without it and keeps the test suite self-contained.

pub mod config;
pub mod imaging;
pub mod notify;
pub mod output;
pub mod resizer;
pub mod rules;
pub mod statistics;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_helpers;
