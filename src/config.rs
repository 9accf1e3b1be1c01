//! Configuration loading and validation.
//!
//! The configuration is a single TOML file layered over stock defaults: the
//! user file only needs the keys it wants to override. After merging, the
//! result is validated into a typed [`RuleSet`] that the resizer uses.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! site_root = "."                                # Directories are relative to this
//! statistics_file = ".image-autoresize.json"      # "" disables statistics
//!
//! directories = "fileadmin/,uploads/"
//! file_types = "jpg,jpeg,png"
//! threshold = "400K"                             # Bytes, K, M or G
//! max_width = 1024
//! max_height = 768
//! auto_orient = true
//! keep_metadata = false
//! resize_png_with_alpha = false
//! conversion_mapping = "ai => jpg,bmp => jpg,pcx => jpg,tga => jpg,tif => jpg,tiff => jpg"
//!
//! [processor]
//! tool = "imagemagick"                           # imagemagick | graphicsmagick | builtin
//! path = ""                                      # Directory holding the binaries, "" = $PATH
//! quality = 85
//!
//! [[rulesets]]                                   # Evaluated before the general rule
//! description = "Editors"
//! usergroups = [2]
//! max_width = 800                                # Unset keys inherit the general rule
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::notify::{Notifier, Severity};
use crate::rules::{
    ConversionMapping, DirectoryPattern, Rule, RuleSet, normalize_extension, parse_size,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid threshold '{0}' (expected e.g. 400K, 2M or a byte count)")]
    InvalidThreshold(String),
    #[error("invalid conversion mapping entry '{0}' (expected 'source => target')")]
    InvalidMapping(String),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// External tool used to resize images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    /// ImageMagick `convert` / `identify`.
    ImageMagick,
    /// GraphicsMagick `gm convert` / `gm identify`.
    GraphicsMagick,
    /// In-process decoding and encoding with the `image` crate.
    Builtin,
}

/// Image processor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessorConfig {
    pub tool: Tool,
    /// Directory containing the tool binaries. Empty means search `$PATH`.
    pub path: String,
    /// Lossy encoding quality (1-100).
    pub quality: u32,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            tool: Tool::ImageMagick,
            path: String::new(),
            quality: 85,
        }
    }
}

impl ProcessorConfig {
    pub fn binary_dir(&self) -> Option<PathBuf> {
        (!self.path.trim().is_empty()).then(|| PathBuf::from(self.path.trim()))
    }
}

/// A group-specific rule set. Every unset key inherits the general rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RulesetConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub usergroups: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directories: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_types: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_orient: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_metadata: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resize_png_with_alpha: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversion_mapping: Option<String>,
}

/// Configuration as read from `image-autoresize.toml`.
///
/// The top-level rule keys form the general rule; `rulesets` add
/// group-specific rules evaluated before it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AutoresizeConfig {
    /// Root that rule directories are relative to.
    pub site_root: String,
    /// Statistics JSON file, relative to `site_root`. Empty disables it.
    pub statistics_file: String,
    pub directories: String,
    pub file_types: String,
    pub threshold: String,
    pub max_width: u32,
    pub max_height: u32,
    pub auto_orient: bool,
    pub keep_metadata: bool,
    pub resize_png_with_alpha: bool,
    pub conversion_mapping: String,
    pub processor: ProcessorConfig,
    pub rulesets: Vec<RulesetConfig>,
}

impl Default for AutoresizeConfig {
    fn default() -> Self {
        Self {
            site_root: ".".to_string(),
            statistics_file: ".image-autoresize.json".to_string(),
            directories: "fileadmin/,uploads/".to_string(),
            file_types: "jpg,jpeg,png".to_string(),
            threshold: "400K".to_string(),
            max_width: 1024,
            max_height: 768,
            auto_orient: true,
            keep_metadata: false,
            resize_png_with_alpha: false,
            conversion_mapping: [
                "ai => jpg",
                "bmp => jpg",
                "pcx => jpg",
                "tga => jpg",
                "tif => jpg",
                "tiff => jpg",
            ]
            .join(","),
            processor: ProcessorConfig::default(),
            rulesets: Vec::new(),
        }
    }
}

impl AutoresizeConfig {
    /// Validate values that do not end up in a rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.processor.quality) {
            return Err(ConfigError::Validation(
                "processor.quality must be 1-100".into(),
            ));
        }
        self.rule_set().map(|_| ())
    }

    /// Build the typed rule set: group rule sets in order, general rule last.
    pub fn rule_set(&self) -> Result<RuleSet, ConfigError> {
        let general = RulesetConfig {
            description: Some("general".to_string()),
            ..RulesetConfig::default()
        };
        let mut rules = Vec::with_capacity(self.rulesets.len() + 1);
        for ruleset in self.rulesets.iter().chain(std::iter::once(&general)) {
            rules.push(self.build_rule(ruleset)?);
        }
        Ok(RuleSet::new(rules))
    }

    fn build_rule(&self, overrides: &RulesetConfig) -> Result<Rule, ConfigError> {
        let directories = overrides.directories.as_deref().unwrap_or(&self.directories);
        let file_types = overrides.file_types.as_deref().unwrap_or(&self.file_types);
        let threshold = overrides.threshold.as_deref().unwrap_or(&self.threshold);
        let mapping = overrides
            .conversion_mapping
            .as_deref()
            .unwrap_or(&self.conversion_mapping);
        let max_width = overrides.max_width.unwrap_or(self.max_width);
        let max_height = overrides.max_height.unwrap_or(self.max_height);
        let label = overrides.description.as_deref().unwrap_or("ruleset");

        if max_width == 0 || max_height == 0 {
            return Err(ConfigError::Validation(format!(
                "{label}: max_width and max_height must be non-zero"
            )));
        }

        Ok(Rule {
            description: overrides.description.clone(),
            directories: split_list(directories)
                .map(DirectoryPattern::parse)
                .collect(),
            file_types: split_list(file_types).map(normalize_extension).collect(),
            threshold: parse_size(threshold)?,
            max_width,
            max_height,
            auto_orient: overrides.auto_orient.unwrap_or(self.auto_orient),
            keep_metadata: overrides.keep_metadata.unwrap_or(self.keep_metadata),
            resize_png_with_alpha: overrides
                .resize_png_with_alpha
                .unwrap_or(self.resize_png_with_alpha),
            conversion_mapping: ConversionMapping::parse(mapping)?,
            user_groups: overrides.usergroups.clone(),
        })
    }

    pub fn site_root(&self) -> PathBuf {
        PathBuf::from(&self.site_root)
    }

    /// Absolute-or-site-relative path of the statistics file, if enabled.
    pub fn statistics_path(&self) -> Option<PathBuf> {
        let file = self.statistics_file.trim();
        (!file.is_empty()).then(|| self.site_root().join(file))
    }
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty())
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(AutoresizeConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely, arrays included.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Parse config text, merge it over the stock defaults, and validate.
pub fn parse_config(content: &str) -> Result<AutoresizeConfig, ConfigError> {
    let overlay: toml::Value = toml::from_str(content)?;
    let config: AutoresizeConfig = merge_toml(stock_defaults_value(), overlay).try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config file at `path`.
///
/// A missing file yields the stock defaults; an unreadable or invalid one is
/// an error.
pub fn load_config(path: &Path) -> Result<AutoresizeConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using stock defaults");
        return Ok(AutoresizeConfig::default());
    }
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Load the config for a host integration that must never fail.
///
/// An invalid configuration is reported once as an error notification and
/// resizing is disabled (empty rule set) instead of aborting the host.
pub fn load_or_disabled(path: &Path, notifier: &dyn Notifier) -> (AutoresizeConfig, RuleSet) {
    match load_config(path).and_then(|config| config.rule_set().map(|rules| (config, rules))) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "invalid configuration");
            notifier.notify(
                &format!(
                    "Image autoresize is disabled: configuration {} is invalid ({e})",
                    path.display()
                ),
                Severity::Error,
            );
            (AutoresizeConfig::default(), RuleSet::empty())
        }
    }
}

/// Returns a fully-commented stock config file with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Image Autoresize Configuration
# ==============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# Directory that rule directories are relative to.
site_root = "."

# Running totals of resized images and reclaimed bytes (JSON).
# Relative to site_root. Set to "" to disable.
statistics_file = ".image-autoresize.json"

# ---------------------------------------------------------------------------
# General rule (applies to everyone, evaluated after [[rulesets]])
# ---------------------------------------------------------------------------
# Comma-separated directories; a file anywhere below one of them matches.
# "*" matches within a single path segment, e.g. "fileadmin/*/images/".
directories = "fileadmin/,uploads/"

# Comma-separated file extensions to consider.
file_types = "jpg,jpeg,png"

# Files at or below this size are never touched. Bytes, or with K/M/G suffix.
threshold = "400K"

# Bounding box for resized images; aspect ratio is preserved, never upscaled.
max_width = 1024
max_height = 768

# Rotate according to the EXIF orientation tag.
auto_orient = true

# Keep EXIF/IPTC metadata in the resized file (stripped otherwise).
keep_metadata = false

# PNG files with an alpha channel are skipped unless this is enabled.
resize_png_with_alpha = false

# Formats converted while resizing, as "source => target" pairs.
conversion_mapping = "ai => jpg,bmp => jpg,pcx => jpg,tga => jpg,tif => jpg,tiff => jpg"

# ---------------------------------------------------------------------------
# Image processor
# ---------------------------------------------------------------------------
[processor]
# imagemagick | graphicsmagick | builtin
tool = "imagemagick"

# Directory containing convert/identify or gm. Empty searches $PATH.
path = ""

# Lossy encoding quality (1-100).
quality = 85

# ---------------------------------------------------------------------------
# Group-specific rule sets (first match wins, before the general rule)
# ---------------------------------------------------------------------------
# [[rulesets]]
# description = "News editors"
# usergroups = [2, 5]
# directories = "fileadmin/news/"
# max_width = 800
# max_height = 600
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MessageQueue;
    use tempfile::TempDir;

    #[test]
    fn default_config_matches_stock_values() {
        let config = AutoresizeConfig::default();
        assert_eq!(config.directories, "fileadmin/,uploads/");
        assert_eq!(config.file_types, "jpg,jpeg,png");
        assert_eq!(config.threshold, "400K");
        assert_eq!((config.max_width, config.max_height), (1024, 768));
        assert!(config.auto_orient);
        assert!(!config.keep_metadata);
        assert_eq!(config.processor.tool, Tool::ImageMagick);
        assert_eq!(config.processor.quality, 85);
    }

    #[test]
    fn default_rule_set_has_only_general_rule() {
        let rules = AutoresizeConfig::default().rule_set().unwrap();
        assert_eq!(rules.rules().len(), 1);

        let general = &rules.rules()[0];
        assert_eq!(general.threshold, 400 * 1024);
        assert_eq!(general.file_types, vec!["jpg", "jpeg", "png"]);
        assert_eq!(general.conversion_mapping.get("tiff"), Some("jpg"));
        assert!(general.user_groups.is_empty());
    }

    #[test]
    fn stock_config_toml_parses_to_defaults() {
        let config = parse_config(stock_config_toml()).unwrap();
        let defaults = AutoresizeConfig::default();
        assert_eq!(config.conversion_mapping, defaults.conversion_mapping);
        assert_eq!(config.threshold, defaults.threshold);
        assert_eq!(config.statistics_file, defaults.statistics_file);
        assert!(config.rulesets.is_empty());
    }

    #[test]
    fn parse_partial_config_keeps_defaults() {
        let config = parse_config(
            r#"
max_width = 800

[processor]
tool = "builtin"
"#,
        )
        .unwrap();
        assert_eq!(config.max_width, 800);
        assert_eq!(config.max_height, 768);
        assert_eq!(config.processor.tool, Tool::Builtin);
        assert_eq!(config.processor.quality, 85);
    }

    #[test]
    fn rulesets_inherit_general_values_and_come_first() {
        let config = parse_config(
            r#"
threshold = "1M"

[[rulesets]]
description = "editors"
usergroups = [2]
max_width = 640
"#,
        )
        .unwrap();
        let rules = config.rule_set().unwrap();
        assert_eq!(rules.rules().len(), 2);

        let editors = &rules.rules()[0];
        assert_eq!(editors.description.as_deref(), Some("editors"));
        assert_eq!(editors.user_groups, vec![2]);
        assert_eq!(editors.max_width, 640);
        assert_eq!(editors.max_height, 768);
        assert_eq!(editors.threshold, 1024 * 1024);

        assert_eq!(rules.rules()[1].max_width, 1024);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            parse_config("max_widht = 10"),
            Err(ConfigError::Toml(_))
        ));
        assert!(parse_config("[processor]\nbinary = \"x\"").is_err());
    }

    #[test]
    fn invalid_values_fail_validation() {
        assert!(matches!(
            parse_config(r#"threshold = "huge""#),
            Err(ConfigError::InvalidThreshold(_))
        ));
        assert!(matches!(
            parse_config(r#"conversion_mapping = "bmp -> jpg""#),
            Err(ConfigError::InvalidMapping(_))
        ));
        assert!(matches!(
            parse_config("max_height = 0"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            parse_config("[processor]\nquality = 0"),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn invalid_ruleset_is_reported() {
        let err = parse_config(
            r#"
[[rulesets]]
description = "broken"
max_width = 0
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn merge_toml_overlay_wins_and_preserves_base() {
        let base: toml::Value = toml::from_str("a = 1\n[t]\nx = 1\ny = 2").unwrap();
        let overlay: toml::Value = toml::from_str("[t]\ny = 3").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"].as_integer(), Some(1));
        assert_eq!(merged["t"]["x"].as_integer(), Some(1));
        assert_eq!(merged["t"]["y"].as_integer(), Some(3));
    }

    #[test]
    fn statistics_path_relative_to_site_root() {
        let mut config = AutoresizeConfig {
            site_root: "/var/www".to_string(),
            ..AutoresizeConfig::default()
        };
        assert_eq!(
            config.statistics_path(),
            Some(PathBuf::from("/var/www/.image-autoresize.json"))
        );
        config.statistics_file = String::new();
        assert_eq!(config.statistics_path(), None);
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("missing.toml")).unwrap();
        assert_eq!(config.max_width, 1024);
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("image-autoresize.toml");
        fs::write(&path, "directories = \"media/\"\nmax_height = 500\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.directories, "media/");
        assert_eq!(config.max_height, 500);
        assert_eq!(config.max_width, 1024);
    }

    #[test]
    fn load_or_disabled_notifies_once_and_disables() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("image-autoresize.toml");
        fs::write(&path, "threshold = \"nope\"").unwrap();

        let queue = MessageQueue::new();
        let (_, rules) = load_or_disabled(&path, &queue);

        assert!(rules.is_empty());
        let messages = queue.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].severity, Severity::Error);
        assert!(messages[0].message.contains("disabled"));
    }

    #[test]
    fn load_or_disabled_valid_config_is_silent() {
        let tmp = TempDir::new().unwrap();
        let queue = MessageQueue::new();
        let (config, rules) = load_or_disabled(&tmp.path().join("none.toml"), &queue);
        assert_eq!(config.max_width, 1024);
        assert_eq!(rules.rules().len(), 1);
        assert!(queue.messages().is_empty());
    }
}
