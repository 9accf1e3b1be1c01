//! Typed resize rules and rule matching.
//!
//! A [`RuleSet`] is the validated, immutable form of the configuration. It is
//! an ordered list of [`Rule`]s; the first rule whose directories, file types
//! and user groups all match a file decides how that file is processed.
//!
//! ## Directory patterns
//!
//! Directories are matched segment by segment against the directory the file
//! ends up in, relative to the site root:
//!
//! ```text
//! pattern               directory                      match
//! fileadmin/            fileadmin/user_upload          yes (prefix)
//! fileadmin/*/images/   fileadmin/news/images/2024     yes
//! fileadmin/*/images/   fileadmin/news/docs            no
//! uploads/              other/uploads                  no
//! /srv/media/           /srv/media/incoming            yes (absolute)
//! ```
//!
//! `*` matches any run of characters within a single segment.

use crate::config::ConfigError;
use std::fmt;

/// A directory pattern such as `fileadmin/*/images/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryPattern {
    absolute: bool,
    segments: Vec<String>,
}

impl DirectoryPattern {
    pub fn parse(pattern: &str) -> Self {
        let trimmed = pattern.trim();
        Self {
            absolute: trimmed.starts_with('/'),
            segments: split_segments(trimmed),
        }
    }

    /// Whether `directory` lies at or below this pattern.
    pub fn matches(&self, directory: &str) -> bool {
        if directory.starts_with('/') != self.absolute {
            return false;
        }
        let segments = split_segments(directory);
        if segments.len() < self.segments.len() {
            return false;
        }
        self.segments
            .iter()
            .zip(&segments)
            .all(|(pattern, segment)| glob_segment(pattern, segment))
    }
}

impl fmt::Display for DirectoryPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.absolute {
            f.write_str("/")?;
        }
        for segment in &self.segments {
            write!(f, "{segment}/")?;
        }
        Ok(())
    }
}

fn split_segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .map(str::to_string)
        .collect()
}

/// Match a single path segment against a pattern where `*` matches any run
/// of characters.
fn glob_segment(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && p[pi] == '*' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if pi < p.len() && p[pi] == t[ti] {
            pi += 1;
            ti += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            ti = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}

/// Ordered `source => target` extension substitutions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionMapping {
    pairs: Vec<(String, String)>,
}

impl ConversionMapping {
    /// Parse `"bmp => jpg, tif => jpg"`. Entries may also be newline separated.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let mut pairs = Vec::new();
        for entry in input.split([',', '\n']).map(str::trim) {
            if entry.is_empty() {
                continue;
            }
            let (source, target) = entry
                .split_once("=>")
                .map(|(s, t)| (normalize_extension(s), normalize_extension(t)))
                .filter(|(s, t)| !s.is_empty() && !t.is_empty())
                .ok_or_else(|| ConfigError::InvalidMapping(entry.to_string()))?;
            pairs.push((source, target));
        }
        Ok(Self { pairs })
    }

    /// Target extension for `extension`, if one is mapped.
    pub fn get(&self, extension: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(source, _)| source.eq_ignore_ascii_case(extension))
            .map(|(_, target)| target.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(s, t)| (s.as_str(), t.as_str()))
    }
}

impl fmt::Display for ConversionMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<String> = self.iter().map(|(s, t)| format!("{s} => {t}")).collect();
        f.write_str(&entries.join(", "))
    }
}

/// Lower-case an extension and drop a leading dot.
pub fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Parse a byte size such as `400K`, `1.5M`, `2G` or `123456`.
///
/// Suffixes are binary multiples and case-insensitive; a trailing `B` is
/// accepted (`400KB`). An empty string means zero.
pub fn parse_size(input: &str) -> Result<u64, ConfigError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, suffix) = trimmed.split_at(split);
    let invalid = || ConfigError::InvalidThreshold(input.to_string());

    let value: f64 = number.parse().map_err(|_| invalid())?;
    let multiplier: u64 = match suffix.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "K" | "KB" => 1024,
        "M" | "MB" => 1024 * 1024,
        "G" | "GB" => 1024 * 1024 * 1024,
        _ => return Err(invalid()),
    };
    Ok((value * multiplier as f64).round() as u64)
}

/// One resize rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Free-form label shown by `check`.
    pub description: Option<String>,
    pub directories: Vec<DirectoryPattern>,
    /// Lower-case extensions without dot.
    pub file_types: Vec<String>,
    /// Files at or below this many bytes are left alone.
    pub threshold: u64,
    pub max_width: u32,
    pub max_height: u32,
    pub auto_orient: bool,
    pub keep_metadata: bool,
    pub resize_png_with_alpha: bool,
    pub conversion_mapping: ConversionMapping,
    /// Restrict the rule to callers in one of these groups. Empty = everyone.
    pub user_groups: Vec<u32>,
}

impl Rule {
    /// Whether the rule applies to a file in `directory` with `extension`,
    /// uploaded by a member of `user_groups`.
    pub fn matches(&self, directory: &str, extension: &str, user_groups: &[u32]) -> bool {
        let extension = normalize_extension(extension);
        self.file_types.iter().any(|t| *t == extension)
            && self.directories.iter().any(|d| d.matches(directory))
            && (self.user_groups.is_empty()
                || self.user_groups.iter().any(|g| user_groups.contains(g)))
    }

    /// Extension a file with `extension` is converted to, or `extension` itself.
    pub fn target_extension(&self, extension: &str) -> String {
        self.conversion_mapping
            .get(extension)
            .map(str::to_string)
            .unwrap_or_else(|| normalize_extension(extension))
    }
}

/// Ordered list of rules; the first match wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// A rule set that never matches, i.e. resizing disabled.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn find(&self, directory: &str, extension: &str, user_groups: &[u32]) -> Option<&Rule> {
        self.rules
            .iter()
            .find(|rule| rule.matches(directory, extension, user_groups))
    }
}
