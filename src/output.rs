//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Process / batch
//!
//! ```text
//! uploads/holiday.bmp → uploads/holiday.jpg
//!     1024x768, 2.3 MB → 184.2 KB (saved 2.1 MB)
//! uploads/logo.png: unchanged
//!
//! Resized 1 of 2 files, saved 2.1 MB
//! ```
//!
//! ## Check
//!
//! ```text
//! 001 Editors
//!     Directories: fileadmin/news/
//!     File types: jpg, jpeg, png
//!     Threshold: 400.0 KB
//!     Max size: 800x600
//!     Auto-orient: yes
//!     Keep metadata: no
//!     Resize PNG with alpha: no
//!     Conversion: bmp => jpg, tif => jpg
//!     User groups: 2, 5
//! 002 general
//!     ...
//! ```
//!
//! ## Stats
//!
//! ```text
//! Image Autoresize has resized 42 images, saving 175.0 MB of storage.
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::resizer::ResizeOutcome;
use crate::rules::RuleSet;
use crate::statistics::Statistics;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based position as a zero-padded 3-digit index.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// Human-readable byte count with binary units: `512 B`, `1.5 KB`, `3.2 MB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

// ============================================================================
// Stats
// ============================================================================

/// Savings banner. Empty when nothing has been resized yet.
pub fn format_banner(stats: &Statistics) -> Vec<String> {
    if stats.images == 0 {
        return Vec::new();
    }
    let noun = if stats.images == 1 { "image" } else { "images" };
    vec![format!(
        "Image Autoresize has resized {} {noun}, saving {} of storage.",
        stats.images,
        format_size(stats.bytes)
    )]
}

pub fn print_banner(stats: &Statistics) {
    for line in format_banner(stats) {
        println!("{}", line);
    }
}

// ============================================================================
// Process
// ============================================================================

pub fn format_outcome(source: &Path, outcome: &ResizeOutcome) -> Vec<String> {
    match outcome.resized() {
        None => vec![format!("{}: unchanged", source.display())],
        Some(image) => vec![
            format!("{} → {}", source.display(), image.path.display()),
            format!(
                "{}{}x{}, {} → {} (saved {})",
                indent(1),
                image.metadata.width,
                image.metadata.height,
                format_size(image.original_size),
                format_size(image.new_size),
                format_size(image.bytes_saved())
            ),
        ],
    }
}

pub fn print_outcome(source: &Path, outcome: &ResizeOutcome) {
    for line in format_outcome(source, outcome) {
        println!("{}", line);
    }
}

/// Closing line of a `process` or `batch` run.
pub fn format_summary(outcomes: &[ResizeOutcome]) -> String {
    let resized = outcomes.iter().filter(|o| o.is_resized()).count();
    let saved: u64 = outcomes.iter().map(ResizeOutcome::bytes_saved).sum();
    format!(
        "Resized {resized} of {} files, saved {}",
        outcomes.len(),
        format_size(saved)
    )
}

// ============================================================================
// Check
// ============================================================================

pub fn format_rule_set(rules: &RuleSet) -> Vec<String> {
    if rules.is_empty() {
        return vec!["No rules configured; resizing is disabled.".to_string()];
    }

    let mut lines = Vec::new();
    for (i, rule) in rules.rules().iter().enumerate() {
        let title = rule.description.as_deref().unwrap_or("(unnamed)");
        lines.push(format!("{} {}", format_index(i + 1), title));

        let directories: Vec<String> = rule.directories.iter().map(|d| d.to_string()).collect();
        let pad = indent(1);
        lines.push(format!("{pad}Directories: {}", directories.join(", ")));
        lines.push(format!("{pad}File types: {}", rule.file_types.join(", ")));
        lines.push(format!("{pad}Threshold: {}", format_size(rule.threshold)));
        lines.push(format!(
            "{pad}Max size: {}x{}",
            rule.max_width, rule.max_height
        ));
        lines.push(format!("{pad}Auto-orient: {}", yes_no(rule.auto_orient)));
        lines.push(format!("{pad}Keep metadata: {}", yes_no(rule.keep_metadata)));
        lines.push(format!(
            "{pad}Resize PNG with alpha: {}",
            yes_no(rule.resize_png_with_alpha)
        ));
        if !rule.conversion_mapping.is_empty() {
            lines.push(format!("{pad}Conversion: {}", rule.conversion_mapping));
        }
        if !rule.user_groups.is_empty() {
            let groups: Vec<String> = rule.user_groups.iter().map(u32::to_string).collect();
            lines.push(format!("{pad}User groups: {}", groups.join(", ")));
        }
    }
    lines
}

pub fn print_rule_set(rules: &RuleSet) {
    for line in format_rule_set(rules) {
        println!("{}", line);
    }
}
