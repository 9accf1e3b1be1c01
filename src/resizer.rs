//! Resize decision engine.
//!
//! [`ImageResizer::evaluate`] decides whether one file needs work and, if so,
//! has the backend shrink it (and possibly convert it) in place:
//!
//! 1. Pick the first rule matching the file's directory, extension and the
//!    caller's user groups.
//! 2. Skip files at or below the rule's size threshold.
//! 3. Identify the image; skip transparent PNGs unless the rule allows them.
//! 4. Skip images that already fit, need no conversion and are upright (or
//!    the rule does not auto-orient).
//! 5. Write a staged output next to the source, then move it into place.
//! 6. Read back metadata, update statistics, notify.
//!
//! Nothing here returns an error. Every failure is reported through the
//! [`Notifier`] and the file is left as it was, so a broken tool never breaks
//! an upload.
//!
//! ```text
//! uploads/holiday.bmp (4.1 MB, 3000x2000)
//!   → uploads/.holiday.autoresize.jpg   (staged)
//!   → uploads/holiday.jpg               (1024x683, 190 KB)
//!   ✗ uploads/holiday.bmp               (removed, extension changed)
//! ```

use crate::config::AutoresizeConfig;
use crate::imaging::{ImageBackend, ImageMetadata, Quality, ResizeParams, fit_within, fits_within};
use crate::notify::{Notifier, Severity};
use crate::output::format_size;
use crate::rules::{Rule, RuleSet, normalize_extension};
use crate::statistics;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A file to evaluate.
///
/// During an upload the file on disk is usually a temporary file; the name
/// and directory it will be stored under drive rule matching instead.
#[derive(Debug, Clone, Copy)]
pub struct ResizeRequest<'a> {
    pub source: &'a Path,
    /// Name the file will be stored under, if it differs from `source`.
    pub target_file_name: Option<&'a str>,
    /// Directory the file will be stored in, if it differs from `source`'s.
    pub target_directory: Option<&'a Path>,
    pub user_groups: &'a [u32],
}

impl<'a> ResizeRequest<'a> {
    pub fn new(source: &'a Path) -> Self {
        Self {
            source,
            target_file_name: None,
            target_directory: None,
            user_groups: &[],
        }
    }

    pub fn target_file_name(mut self, name: &'a str) -> Self {
        self.target_file_name = Some(name);
        self
    }

    pub fn target_directory(mut self, directory: &'a Path) -> Self {
        self.target_directory = Some(directory);
        self
    }

    pub fn user_groups(mut self, groups: &'a [u32]) -> Self {
        self.user_groups = groups;
        self
    }

    /// Extension that drives rule matching, lower-cased.
    fn extension(&self) -> Option<String> {
        let name = match self.target_file_name {
            Some(name) => Path::new(name),
            None => self.source,
        };
        name.extension()
            .and_then(|e| e.to_str())
            .map(normalize_extension)
            .filter(|e| !e.is_empty())
    }

    fn directory(&self) -> &Path {
        self.target_directory
            .or_else(|| self.source.parent())
            .unwrap_or(Path::new(""))
    }

    /// File name used in messages.
    fn display_name(&self) -> String {
        self.target_file_name
            .map(str::to_string)
            .or_else(|| {
                self.source
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| self.source.display().to_string())
    }
}

/// A file the resizer replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizedImage {
    /// Where the result now lives.
    pub path: PathBuf,
    pub file_name: String,
    /// New extension, when the file was converted.
    pub extension: Option<String>,
    pub original_size: u64,
    pub new_size: u64,
    pub metadata: ImageMetadata,
}

impl ResizedImage {
    pub fn bytes_saved(&self) -> u64 {
        self.original_size.saturating_sub(self.new_size)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResizeOutcome {
    Unchanged,
    Resized(ResizedImage),
}

impl ResizeOutcome {
    pub fn is_resized(&self) -> bool {
        matches!(self, ResizeOutcome::Resized(_))
    }

    pub fn resized(&self) -> Option<&ResizedImage> {
        match self {
            ResizeOutcome::Resized(image) => Some(image),
            ResizeOutcome::Unchanged => None,
        }
    }

    /// Bytes saved; zero when unchanged.
    pub fn bytes_saved(&self) -> u64 {
        self.resized().map_or(0, ResizedImage::bytes_saved)
    }
}

/// Applies a [`RuleSet`] to files using an [`ImageBackend`].
pub struct ImageResizer<B> {
    rules: RuleSet,
    backend: B,
    site_root: PathBuf,
    quality: Quality,
    statistics: Option<PathBuf>,
}

impl<B: ImageBackend> ImageResizer<B> {
    pub fn new(rules: RuleSet, backend: B) -> Self {
        Self {
            rules,
            backend,
            site_root: PathBuf::from("."),
            quality: Quality::default(),
            statistics: None,
        }
    }

    /// Build a resizer from a loaded configuration.
    pub fn configured(config: &AutoresizeConfig, rules: RuleSet, backend: B) -> Self {
        let resizer = Self::new(rules, backend)
            .with_site_root(config.site_root())
            .with_quality(Quality::new(config.processor.quality));
        match config.statistics_path() {
            Some(path) => resizer.with_statistics_file(path),
            None => resizer,
        }
    }

    /// Directory that rule directories are relative to.
    pub fn with_site_root(mut self, site_root: impl Into<PathBuf>) -> Self {
        self.site_root = site_root.into();
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_statistics_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.statistics = Some(path.into());
        self
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn site_root(&self) -> &Path {
        &self.site_root
    }

    /// Directory as rule patterns see it: relative to the site root when the
    /// directory lies below it, unchanged otherwise.
    fn relative_directory(&self, directory: &Path) -> String {
        let relative = directory
            .strip_prefix(&self.site_root)
            .ok()
            .map(Path::to_path_buf)
            .or_else(|| {
                let root = self.site_root.canonicalize().ok()?;
                let directory = directory.canonicalize().ok()?;
                directory.strip_prefix(&root).ok().map(Path::to_path_buf)
            })
            .unwrap_or_else(|| directory.to_path_buf());
        relative.to_string_lossy().replace('\\', "/")
    }

    fn matching_rule(&self, request: &ResizeRequest<'_>) -> Option<(&Rule, String)> {
        let extension = request.extension()?;
        let directory = self.relative_directory(request.directory());
        let rule = self.rules.find(&directory, &extension, request.user_groups);
        if rule.is_none() {
            debug!(%directory, %extension, "no rule matches");
        }
        rule.map(|rule| (rule, extension))
    }

    /// File name the upload will be stored under once converted, or `None`
    /// when no matching rule converts its extension.
    ///
    /// Only names are inspected; the image itself is never read.
    pub fn processed_file_name(&self, request: &ResizeRequest<'_>) -> Option<String> {
        let (rule, extension) = self.matching_rule(request)?;
        let target = rule.target_extension(&extension);
        if target == extension {
            return None;
        }
        let name = Path::new(request.target_file_name.unwrap_or_else(|| {
            request
                .source
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("")
        }));
        let stem = name.file_stem()?.to_string_lossy();
        Some(format!("{stem}.{target}"))
    }

    /// Resize `request.source` in place if a rule asks for it.
    pub fn evaluate(&self, request: &ResizeRequest<'_>, notifier: &dyn Notifier) -> ResizeOutcome {
        let source = request.source;
        let Some((rule, extension)) = self.matching_rule(request) else {
            return ResizeOutcome::Unchanged;
        };
        let name = request.display_name();

        let original_size = match fs::metadata(source) {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!(source = %source.display(), error = %e, "cannot stat file");
                return ResizeOutcome::Unchanged;
            }
        };
        if original_size <= rule.threshold {
            debug!(%name, original_size, threshold = rule.threshold, "below threshold");
            return ResizeOutcome::Unchanged;
        }

        let image = match self.backend.identify(source) {
            Ok(image) => image,
            Err(e) => {
                notifier.notify(
                    &format!("{name} could not be identified as an image: {e}"),
                    Severity::Warning,
                );
                return ResizeOutcome::Unchanged;
            }
        };

        if extension == "png" && image.has_alpha && !rule.resize_png_with_alpha {
            notifier.notify(
                &format!("{name} has an alpha channel and was not resized"),
                Severity::Warning,
            );
            return ResizeOutcome::Unchanged;
        }

        let target_extension = rule.target_extension(&extension);
        let converts = target_extension != extension;
        let reorients = rule.auto_orient && image.rotated;
        let max = (rule.max_width, rule.max_height);
        if !converts && !reorients && fits_within((image.width, image.height), max) {
            debug!(%name, width = image.width, height = image.height, "already fits");
            return ResizeOutcome::Unchanged;
        }

        let final_path = if converts {
            source.with_extension(&target_extension)
        } else {
            source.to_path_buf()
        };
        if converts && final_path.exists() {
            notifier.notify(
                &format!(
                    "{name} was not converted: {} already exists",
                    final_path.display()
                ),
                Severity::Warning,
            );
            return ResizeOutcome::Unchanged;
        }

        let staged = staged_output_path(source, &target_extension);
        let params = ResizeParams {
            source: source.to_path_buf(),
            output: staged.clone(),
            max_width: rule.max_width,
            max_height: rule.max_height,
            auto_orient: rule.auto_orient,
            keep_metadata: rule.keep_metadata,
            quality: self.quality,
        };

        let new_size = match self
            .backend
            .resize(&params)
            .map_err(|e| e.to_string())
            .and_then(|()| fs::metadata(&staged).map_err(|e| e.to_string()))
            .and_then(|meta| {
                fs::rename(&staged, &final_path)
                    .map(|()| meta.len())
                    .map_err(|e| e.to_string())
            }) {
            Ok(size) => size,
            Err(e) => {
                discard(&staged);
                notifier.notify(&format!("{name} could not be resized: {e}"), Severity::Error);
                return ResizeOutcome::Unchanged;
            }
        };

        if converts {
            if let Err(e) = fs::remove_file(source) {
                warn!(source = %source.display(), error = %e, "cannot remove converted original");
            }
        }

        let metadata = self.backend.read_metadata(&final_path).unwrap_or_else(|e| {
            warn!(path = %final_path.display(), error = %e, "cannot read metadata");
            let (width, height) = fit_within((image.width, image.height), max);
            ImageMetadata {
                width,
                height,
                ..ImageMetadata::default()
            }
        });

        let resized = ResizedImage {
            file_name: final_file_name(request, &final_path, converts.then_some(&target_extension)),
            path: final_path,
            extension: converts.then_some(target_extension),
            original_size,
            new_size,
            metadata,
        };

        if let Some(path) = &self.statistics {
            if let Err(e) = statistics::record(path, resized.bytes_saved()) {
                warn!(path = %path.display(), error = %e, "cannot update statistics");
            }
        }

        info!(
            %name,
            path = %resized.path.display(),
            original_size,
            new_size,
            width = resized.metadata.width,
            height = resized.metadata.height,
            "resized"
        );
        notifier.notify(
            &format!(
                "{name} was resized from {} to {}",
                format_size(original_size),
                format_size(new_size)
            ),
            Severity::Ok,
        );
        ResizeOutcome::Resized(resized)
    }
}

/// `.{stem}.autoresize.{ext}` next to `source`.
fn staged_output_path(source: &Path, extension: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    source.with_file_name(format!(".{stem}.autoresize.{extension}"))
}

/// Name the stored file ends up with: the requested name, with its extension
/// replaced on conversion.
fn final_file_name(request: &ResizeRequest<'_>, final_path: &Path, converted: Option<&String>) -> String {
    match (request.target_file_name, converted) {
        (Some(name), Some(extension)) => Path::new(name)
            .with_extension(extension)
            .to_string_lossy()
            .into_owned(),
        (Some(name), None) => name.to_string(),
        (None, _) => final_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

fn discard(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "cannot remove staged output");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::ImageInfo;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::notify::MessageQueue;
    use crate::statistics::Statistics;
    use crate::test_helpers::test_rule;
    use tempfile::TempDir;

    fn info(width: u32, height: u32, has_alpha: bool) -> ImageInfo {
        ImageInfo {
            width,
            height,
            has_alpha,
            rotated: false,
        }
    }

    fn rotated(width: u32, height: u32) -> ImageInfo {
        ImageInfo {
            rotated: true,
            ..info(width, height, false)
        }
    }

    /// Write `size` bytes at `root/relative`.
    fn upload(root: &Path, relative: &str, size: usize) -> PathBuf {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, vec![0u8; size]).unwrap();
        path
    }

    fn resizer(root: &Path, backend: MockBackend) -> ImageResizer<MockBackend> {
        ImageResizer::new(RuleSet::new(vec![test_rule()]), backend).with_site_root(root)
    }

    #[test]
    fn no_matching_directory_is_unchanged() {
        let tmp = TempDir::new().unwrap();
        let file = upload(tmp.path(), "other/photo.jpg", 2000);
        let resizer = resizer(tmp.path(), MockBackend::with_info(vec![info(2000, 1500, false)]));
        let queue = MessageQueue::new();

        let outcome = resizer.evaluate(&ResizeRequest::new(&file), &queue);

        assert_eq!(outcome, ResizeOutcome::Unchanged);
        assert!(resizer.backend.get_operations().is_empty());
        assert!(queue.messages().is_empty());
    }

    #[test]
    fn unknown_extension_is_unchanged() {
        let tmp = TempDir::new().unwrap();
        let file = upload(tmp.path(), "uploads/notes.txt", 2000);
        let resizer = resizer(tmp.path(), MockBackend::new());

        let outcome = resizer.evaluate(&ResizeRequest::new(&file), &MessageQueue::new());
        assert!(!outcome.is_resized());
    }

    #[test]
    fn below_threshold_never_touches_backend() {
        let tmp = TempDir::new().unwrap();
        // test_rule threshold is 1000 bytes
        let file = upload(tmp.path(), "uploads/small.jpg", 1000);
        let resizer = resizer(tmp.path(), MockBackend::with_info(vec![info(4000, 3000, false)]));

        let outcome = resizer.evaluate(&ResizeRequest::new(&file), &MessageQueue::new());

        assert_eq!(outcome, ResizeOutcome::Unchanged);
        assert!(resizer.backend.get_operations().is_empty());
        assert_eq!(fs::read(&file).unwrap(), vec![0u8; 1000]);
    }

    #[test]
    fn oversized_jpeg_is_resized_in_place() {
        let tmp = TempDir::new().unwrap();
        let file = upload(tmp.path(), "uploads/photo.jpg", 5000);
        let resizer = resizer(tmp.path(), MockBackend::with_info(vec![info(2000, 1500, false)]));
        let queue = MessageQueue::new();

        let outcome = resizer.evaluate(&ResizeRequest::new(&file), &queue);

        let resized = outcome.resized().expect("resized");
        assert_eq!(resized.path, file);
        assert_eq!(resized.file_name, "photo.jpg");
        assert_eq!(resized.extension, None);
        assert_eq!(resized.original_size, 5000);
        assert_eq!(resized.new_size, b"resized".len() as u64);
        assert_eq!(outcome.bytes_saved(), 5000 - 7);
        assert_eq!(fs::read(&file).unwrap(), b"resized");

        let staged = tmp.path().join("uploads/.photo.autoresize.jpg");
        assert!(!staged.exists());
        assert!(matches!(
            resizer.backend.last_resize(),
            Some(RecordedOp::Resize { max_width: 800, max_height: 600, auto_orient: true, keep_metadata: false, output, .. })
                if output == staged.to_string_lossy()
        ));

        let messages = queue.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].severity, Severity::Ok);
        assert!(messages[0].message.contains("photo.jpg"));
    }

    #[test]
    fn already_fitting_image_is_unchanged() {
        let tmp = TempDir::new().unwrap();
        let file = upload(tmp.path(), "uploads/photo.jpg", 5000);
        let resizer = resizer(tmp.path(), MockBackend::with_info(vec![info(800, 600, false)]));

        let outcome = resizer.evaluate(&ResizeRequest::new(&file), &MessageQueue::new());

        assert_eq!(outcome, ResizeOutcome::Unchanged);
        assert!(resizer.backend.last_resize().is_none());
    }

    #[test]
    fn rotated_image_is_oriented_even_when_fitting() {
        let tmp = TempDir::new().unwrap();
        let file = upload(tmp.path(), "uploads/photo.jpg", 5000);
        let resizer = resizer(tmp.path(), MockBackend::with_info(vec![rotated(600, 400)]));

        let outcome = resizer.evaluate(&ResizeRequest::new(&file), &MessageQueue::new());

        let resized = outcome.resized().expect("oriented");
        assert_eq!(resized.path, file);
        assert_eq!(resized.extension, None);
        assert!(matches!(
            resizer.backend.last_resize(),
            Some(RecordedOp::Resize { auto_orient: true, .. })
        ));
    }

    #[test]
    fn rotated_image_left_alone_without_auto_orient() {
        let tmp = TempDir::new().unwrap();
        let file = upload(tmp.path(), "uploads/photo.jpg", 5000);
        let mut rule = test_rule();
        rule.auto_orient = false;
        let resizer = ImageResizer::new(
            RuleSet::new(vec![rule]),
            MockBackend::with_info(vec![rotated(600, 400)]),
        )
        .with_site_root(tmp.path());

        let outcome = resizer.evaluate(&ResizeRequest::new(&file), &MessageQueue::new());

        assert_eq!(outcome, ResizeOutcome::Unchanged);
        assert!(resizer.backend.last_resize().is_none());
    }

    #[test]
    fn mapped_extension_converts_even_when_fitting() {
        let tmp = TempDir::new().unwrap();
        let file = upload(tmp.path(), "uploads/scan.bmp", 5000);
        let resizer = resizer(tmp.path(), MockBackend::with_info(vec![info(640, 480, false)]));

        let outcome = resizer.evaluate(&ResizeRequest::new(&file), &MessageQueue::new());

        let resized = outcome.resized().expect("converted");
        let converted = tmp.path().join("uploads/scan.jpg");
        assert_eq!(resized.path, converted);
        assert_eq!(resized.file_name, "scan.jpg");
        assert_eq!(resized.extension.as_deref(), Some("jpg"));
        assert!(converted.exists());
        assert!(!file.exists());
    }

    #[test]
    fn conversion_does_not_overwrite_existing_file() {
        let tmp = TempDir::new().unwrap();
        let file = upload(tmp.path(), "uploads/scan.bmp", 5000);
        let existing = upload(tmp.path(), "uploads/scan.jpg", 10);
        let resizer = resizer(tmp.path(), MockBackend::with_info(vec![info(2000, 1500, false)]));
        let queue = MessageQueue::new();

        let outcome = resizer.evaluate(&ResizeRequest::new(&file), &queue);

        assert_eq!(outcome, ResizeOutcome::Unchanged);
        assert_eq!(fs::read(&existing).unwrap(), vec![0u8; 10]);
        assert!(file.exists());
        assert_eq!(queue.messages()[0].severity, Severity::Warning);
    }

    #[test]
    fn png_with_alpha_is_skipped_with_warning() {
        let tmp = TempDir::new().unwrap();
        let file = upload(tmp.path(), "uploads/logo.png", 5000);
        let resizer = resizer(tmp.path(), MockBackend::with_info(vec![info(2000, 2000, true)]));
        let queue = MessageQueue::new();

        let outcome = resizer.evaluate(&ResizeRequest::new(&file), &queue);

        assert_eq!(outcome, ResizeOutcome::Unchanged);
        assert!(resizer.backend.last_resize().is_none());
        let messages = queue.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].severity, Severity::Warning);
        assert!(messages[0].message.contains("logo.png"));
    }

    #[test]
    fn png_with_alpha_resized_when_allowed() {
        let tmp = TempDir::new().unwrap();
        let file = upload(tmp.path(), "uploads/logo.png", 5000);
        let mut rule = test_rule();
        rule.resize_png_with_alpha = true;
        let resizer = ImageResizer::new(
            RuleSet::new(vec![rule]),
            MockBackend::with_info(vec![info(2000, 2000, true)]),
        )
        .with_site_root(tmp.path());

        let outcome = resizer.evaluate(&ResizeRequest::new(&file), &MessageQueue::new());
        assert!(outcome.is_resized());
    }

    #[test]
    fn identify_failure_warns_and_keeps_file() {
        let tmp = TempDir::new().unwrap();
        let file = upload(tmp.path(), "uploads/broken.jpg", 5000);
        let resizer = resizer(tmp.path(), MockBackend::new());
        let queue = MessageQueue::new();

        let outcome = resizer.evaluate(&ResizeRequest::new(&file), &queue);

        assert_eq!(outcome, ResizeOutcome::Unchanged);
        assert_eq!(fs::read(&file).unwrap().len(), 5000);
        assert_eq!(queue.messages()[0].severity, Severity::Warning);
    }

    #[test]
    fn backend_failure_reports_error_and_keeps_original() {
        let tmp = TempDir::new().unwrap();
        let file = upload(tmp.path(), "uploads/scan.bmp", 5000);
        let resizer = resizer(tmp.path(), MockBackend::failing(vec![info(2000, 1500, false)]));
        let queue = MessageQueue::new();

        let outcome = resizer.evaluate(&ResizeRequest::new(&file), &queue);

        assert_eq!(outcome, ResizeOutcome::Unchanged);
        assert_eq!(fs::read(&file).unwrap().len(), 5000);
        assert!(!tmp.path().join("uploads/scan.jpg").exists());
        assert!(!tmp.path().join("uploads/.scan.autoresize.jpg").exists());
        let messages = queue.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].severity, Severity::Error);
    }

    #[test]
    fn target_name_and_directory_drive_matching() {
        let tmp = TempDir::new().unwrap();
        // Temporary file outside the site, no extension
        let file = upload(tmp.path(), "tmp/php4F2a", 5000);
        let target_dir = tmp.path().join("uploads/news");
        let resizer = resizer(tmp.path(), MockBackend::with_info(vec![info(2000, 1500, false)]));

        let request = ResizeRequest::new(&file)
            .target_file_name("holiday.jpg")
            .target_directory(&target_dir);
        let outcome = resizer.evaluate(&request, &MessageQueue::new());

        let resized = outcome.resized().expect("resized");
        assert_eq!(resized.file_name, "holiday.jpg");
        assert_eq!(resized.path, file);
    }

    #[test]
    fn user_groups_select_rule() {
        let tmp = TempDir::new().unwrap();
        let file = upload(tmp.path(), "uploads/photo.jpg", 5000);
        let mut editors = test_rule();
        editors.user_groups = vec![7];
        editors.max_width = 400;
        editors.max_height = 300;
        let resizer = ImageResizer::new(
            RuleSet::new(vec![editors, test_rule()]),
            MockBackend::with_info(vec![info(2000, 1500, false), info(2000, 1500, false)]),
        )
        .with_site_root(tmp.path());

        resizer.evaluate(&ResizeRequest::new(&file).user_groups(&[7]), &MessageQueue::new());
        assert!(matches!(
            resizer.backend.last_resize(),
            Some(RecordedOp::Resize { max_width: 400, .. })
        ));

        upload(tmp.path(), "uploads/photo.jpg", 5000);
        resizer.evaluate(&ResizeRequest::new(&file).user_groups(&[1]), &MessageQueue::new());
        assert!(matches!(
            resizer.backend.last_resize(),
            Some(RecordedOp::Resize { max_width: 800, .. })
        ));
    }

    #[test]
    fn statistics_accumulate_across_resizes() {
        let tmp = TempDir::new().unwrap();
        let stats = tmp.path().join("stats.json");
        let a = upload(tmp.path(), "uploads/a.jpg", 3000);
        let b = upload(tmp.path(), "uploads/b.jpg", 4000);
        let resizer = resizer(
            tmp.path(),
            MockBackend::with_info(vec![info(2000, 1500, false), info(2000, 1500, false)]),
        )
        .with_statistics_file(&stats);

        let saved_a = resizer.evaluate(&ResizeRequest::new(&a), &MessageQueue::new()).bytes_saved();
        let saved_b = resizer.evaluate(&ResizeRequest::new(&b), &MessageQueue::new()).bytes_saved();

        assert_eq!(
            Statistics::load(&stats),
            Some(Statistics {
                images: 2,
                bytes: saved_a + saved_b
            })
        );
    }

    #[test]
    fn statistics_failure_is_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let file = upload(tmp.path(), "uploads/a.jpg", 3000);
        // A directory where the statistics file should be
        let stats = tmp.path().join("stats");
        fs::create_dir(&stats).unwrap();
        let resizer = resizer(tmp.path(), MockBackend::with_info(vec![info(2000, 1500, false)]))
            .with_statistics_file(&stats);

        let queue = MessageQueue::new();
        let outcome = resizer.evaluate(&ResizeRequest::new(&file), &queue);
        assert!(outcome.is_resized());
        assert_eq!(queue.messages()[0].severity, Severity::Ok);
    }

    #[test]
    fn processed_file_name_only_for_mapped_extensions() {
        let tmp = TempDir::new().unwrap();
        let resizer = resizer(tmp.path(), MockBackend::new());
        let dir = tmp.path().join("uploads");
        let temp = Path::new("/tmp/php123");

        let bmp = ResizeRequest::new(temp).target_file_name("Scan 01.BMP").target_directory(&dir);
        assert_eq!(resizer.processed_file_name(&bmp).as_deref(), Some("Scan 01.jpg"));

        let jpg = ResizeRequest::new(temp).target_file_name("photo.jpg").target_directory(&dir);
        assert_eq!(resizer.processed_file_name(&jpg), None);

        let other = tmp.path().join("other");
        let elsewhere = ResizeRequest::new(temp).target_file_name("scan.bmp").target_directory(&other);
        assert_eq!(resizer.processed_file_name(&elsewhere), None);
        assert!(resizer.backend.get_operations().is_empty());
    }

    #[test]
    fn relative_directory_strips_site_root() {
        let resizer = ImageResizer::new(RuleSet::empty(), MockBackend::new()).with_site_root("/srv/site");
        assert_eq!(resizer.relative_directory(Path::new("/srv/site/uploads/pics")), "uploads/pics");
        assert_eq!(resizer.relative_directory(Path::new("/elsewhere/uploads")), "/elsewhere/uploads");
    }

    #[test]
    fn configured_picks_up_quality_and_statistics() {
        let mut config = AutoresizeConfig::default();
        config.site_root = "/srv/site".to_string();
        config.processor.quality = 70;
        let rules = config.rule_set().unwrap();
        let resizer = ImageResizer::configured(&config, rules, MockBackend::new());

        assert_eq!(resizer.site_root(), Path::new("/srv/site"));
        assert_eq!(resizer.quality.value(), 70);
        assert_eq!(
            resizer.statistics.as_deref(),
            Some(Path::new("/srv/site/.image-autoresize.json"))
        );
        assert_eq!(resizer.rules().rules().len(), 1);
    }

    #[test]
    fn staged_output_is_hidden_sibling() {
        assert_eq!(
            staged_output_path(Path::new("/a/b/photo.bmp"), "jpg"),
            PathBuf::from("/a/b/.photo.autoresize.jpg")
        );
    }
}
