//! Upload lifecycle hooks.
//!
//! A host's upload pipeline calls [`UploadInterceptor`] at three points:
//!
//! | Hook | When | Effect |
//! |---|---|---|
//! | [`sanitize_file_name`](UploadInterceptor::sanitize_file_name) | name chosen | announce the converted name (`scan.bmp` → `scan.jpg`) |
//! | [`pre_file_add`](UploadInterceptor::pre_file_add) | temp file about to be stored | resize/convert the temp file, fix up the stored name |
//! | [`post_file_replace`](UploadInterceptor::post_file_replace) | existing file overwritten | resize the stored file in place |
//!
//! Only local storages are handled; for any other driver every hook is a
//! no-op returning `None`.
//!
//! A typical upload of `scan.bmp` with `bmp => jpg` configured:
//!
//! ```text
//! sanitize_file_name("scan.bmp")       → Some(SanitizedName { requested: "scan.bmp", sanitized: "scan.jpg" })
//! host stores the name "scan.jpg"
//! pre_file_add("scan.jpg", /tmp/php4F2a, Some(&sanitized))
//!     /tmp/php4F2a → /tmp/php4F2a.bmp  (staged so the tool sees the format)
//!     resize + convert                 → /tmp/php4F2a.jpg
//!     /tmp/php4F2a.jpg → /tmp/php4F2a  (restored)
//!     target name                      → "scan.jpg"
//! ```

use crate::imaging::ImageBackend;
use crate::notify::{Notifier, Severity};
use crate::resizer::{ImageResizer, ResizeOutcome, ResizeRequest};
use crate::rules::normalize_extension;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("cannot stage upload: {0} already exists")]
    StagingConflict(PathBuf),
    #[error("cannot store upload: {0} already exists")]
    TargetExists(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Driver {
    Local,
    /// Any remote driver (S3, WebDAV, ...), identified by name.
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathType {
    /// `base_path` is relative to the site root.
    Relative,
    Absolute,
}

/// A storage as the host configures it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Storage {
    pub driver: Driver,
    pub base_path: String,
    pub path_type: PathType,
}

impl Storage {
    pub fn local(base_path: impl Into<String>, path_type: PathType) -> Self {
        Self {
            driver: Driver::Local,
            base_path: base_path.into(),
            path_type,
        }
    }

    pub fn is_local(&self) -> bool {
        self.driver == Driver::Local
    }
}

/// A folder inside a storage, e.g. identifier `/user_upload/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub storage: Storage,
    pub identifier: String,
}

impl Folder {
    pub fn new(storage: Storage, identifier: impl Into<String>) -> Self {
        Self {
            storage,
            identifier: identifier.into(),
        }
    }

    /// Directory on disk, or `None` for non-local storages.
    ///
    /// ```
    /// # use image_autoresize::upload::{Folder, PathType, Storage};
    /// # use std::path::{Path, PathBuf};
    /// let folder = Folder::new(Storage::local("fileadmin/", PathType::Relative), "/user_upload/");
    /// assert_eq!(
    ///     folder.physical_path(Path::new("/var/www")),
    ///     Some(PathBuf::from("/var/www/fileadmin/user_upload"))
    /// );
    /// ```
    pub fn physical_path(&self, site_root: &Path) -> Option<PathBuf> {
        if !self.storage.is_local() {
            return None;
        }
        let joined = format!(
            "{}/{}",
            self.storage.base_path.trim_end_matches('/'),
            self.identifier.trim_start_matches('/')
        );
        let joined = joined.trim_end_matches('/');
        Some(match self.storage.path_type {
            PathType::Relative => site_root.join(joined.trim_start_matches('/')),
            PathType::Absolute if joined.is_empty() => PathBuf::from("/"),
            PathType::Absolute => PathBuf::from(joined),
        })
    }
}

/// A file already stored in a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub folder: Folder,
    pub name: String,
}

/// Result of [`UploadInterceptor::sanitize_file_name`]: the name the user
/// asked for and the name the file will carry after conversion.
///
/// Hand it back to [`UploadInterceptor::pre_file_add`] so the original format
/// is still known when the temporary file is processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedName {
    pub requested: String,
    pub sanitized: String,
}

/// A temporary upload renamed to carry its declared extension.
///
/// External tools pick the decoder from the extension, and upload temp files
/// usually have none. The file is moved back to its temporary path by
/// [`restore`](Self::restore), [`restore_from`](Self::restore_from), or on
/// drop.
#[derive(Debug)]
pub struct StagedFile {
    temporary: PathBuf,
    current: PathBuf,
    extension: String,
    restored: bool,
}

impl StagedFile {
    /// Rename `temporary` to `temporary.{extension}`.
    pub fn stage(temporary: &Path, extension: &str) -> Result<Self, UploadError> {
        let mut staged = OsString::from(temporary.as_os_str());
        staged.push(".");
        staged.push(extension);
        let staged = PathBuf::from(staged);

        if staged.exists() {
            return Err(UploadError::StagingConflict(staged));
        }
        fs::rename(temporary, &staged)?;
        Ok(Self {
            temporary: temporary.to_path_buf(),
            current: staged,
            extension: extension.to_string(),
            restored: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.current
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Move the staged file back to its temporary path.
    pub fn restore(mut self) -> Result<(), UploadError> {
        self.restore_in_place().map_err(UploadError::from)
    }

    /// Processing replaced the staged file with `produced` (a converted
    /// sibling); move that one back to the temporary path instead.
    pub fn restore_from(mut self, produced: &Path) -> Result<(), UploadError> {
        self.current = produced.to_path_buf();
        self.restore_in_place().map_err(UploadError::from)
    }

    fn restore_in_place(&mut self) -> io::Result<()> {
        if self.restored {
            return Ok(());
        }
        fs::rename(&self.current, &self.temporary)?;
        self.restored = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if let Err(e) = self.restore_in_place() {
            tracing::warn!(
                staged = %self.current.display(),
                temporary = %self.temporary.display(),
                error = %e,
                "cannot restore staged upload"
            );
        }
    }
}

/// Move a processed temporary upload into `directory` as `name`.
///
/// An existing file of that name is never overwritten. Copy + remove also
/// works across filesystems (temp dirs often are).
pub fn store_file(temporary: &Path, directory: &Path, name: &str) -> Result<PathBuf, UploadError> {
    fs::create_dir_all(directory)?;
    let target = directory.join(name);
    let mut stored = match fs::OpenOptions::new().write(true).create_new(true).open(&target) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(UploadError::TargetExists(target));
        }
        Err(e) => return Err(e.into()),
    };
    let copied = fs::File::open(temporary).and_then(|mut source| io::copy(&mut source, &mut stored));
    if let Err(e) = copied {
        drop(stored);
        if let Err(cleanup) = fs::remove_file(&target) {
            tracing::warn!(target = %target.display(), error = %cleanup, "cannot remove partial copy");
        }
        return Err(e.into());
    }
    fs::remove_file(temporary)?;
    Ok(target)
}

/// Connects a host's upload lifecycle to an [`ImageResizer`].
pub struct UploadInterceptor<'a, B> {
    resizer: &'a ImageResizer<B>,
    notifier: &'a dyn Notifier,
}

impl<'a, B: ImageBackend> UploadInterceptor<'a, B> {
    pub fn new(resizer: &'a ImageResizer<B>, notifier: &'a dyn Notifier) -> Self {
        Self { resizer, notifier }
    }

    fn directory(&self, folder: &Folder) -> Option<PathBuf> {
        let directory = folder.physical_path(self.resizer.site_root());
        if directory.is_none() {
            tracing::debug!(driver = ?folder.storage.driver, "storage is not local, skipping");
        }
        directory
    }

    /// The name `file_name` will end up with, when a rule converts it.
    pub fn sanitize_file_name(
        &self,
        file_name: &str,
        folder: &Folder,
        user_groups: &[u32],
    ) -> Option<SanitizedName> {
        let path = self.directory(folder)?.join(file_name);
        let request = ResizeRequest::new(&path).user_groups(user_groups);
        let sanitized = self.resizer.processed_file_name(&request)?;
        Some(SanitizedName {
            requested: file_name.to_string(),
            sanitized,
        })
    }

    /// Process the temporary upload `source_file` before the host stores it
    /// as `target_file_name` in `folder`.
    ///
    /// `source_file` keeps its path; its content may be replaced. When the
    /// image is converted, `target_file_name` receives the new extension.
    /// Returns `None` for non-local storages.
    ///
    /// Never fails: when the temporary file cannot be staged or moved back,
    /// the notifier is told and the upload goes on unresized.
    pub fn pre_file_add(
        &self,
        target_file_name: &mut String,
        folder: &Folder,
        source_file: &Path,
        sanitized: Option<&SanitizedName>,
        user_groups: &[u32],
    ) -> Option<ResizeOutcome> {
        let directory = self.directory(folder)?;

        // Convert from the format the user actually uploaded
        if let Some(name) = sanitized {
            *target_file_name = name.requested.clone();
        }

        let Some(extension) = Path::new(target_file_name.as_str())
            .extension()
            .and_then(|e| e.to_str())
            .map(normalize_extension)
        else {
            tracing::debug!(name = %target_file_name, "upload has no extension");
            return Some(ResizeOutcome::Unchanged);
        };

        let staged = match StagedFile::stage(source_file, &extension) {
            Ok(staged) => staged,
            Err(e) => {
                self.notifier.notify(
                    &format!("{target_file_name} was not processed: {e}"),
                    Severity::Warning,
                );
                return Some(ResizeOutcome::Unchanged);
            }
        };
        let request = ResizeRequest::new(staged.path())
            .target_file_name(target_file_name.as_str())
            .target_directory(&directory)
            .user_groups(user_groups);
        let outcome = self.resizer.evaluate(&request, self.notifier);

        let restored = match outcome.resized() {
            Some(image) => staged
                .restore_from(&image.path)
                .map(|()| *target_file_name = image.file_name.clone()),
            None => staged.restore(),
        };
        if let Err(e) = restored {
            self.notifier.notify(
                &format!(
                    "{target_file_name} could not be moved back to {}: {e}",
                    source_file.display()
                ),
                Severity::Error,
            );
        }
        Some(outcome)
    }

    /// Process `file` after the host replaced its content. The returned
    /// outcome carries the metadata to re-index.
    ///
    /// When a rule converts the extension, `file.name` no longer exists
    /// afterwards: the image lives at the outcome's `path` under its
    /// `file_name`, and the host must update its record to that name.
    pub fn post_file_replace(&self, file: &StoredFile, user_groups: &[u32]) -> Option<ResizeOutcome> {
        let path = self.directory(&file.folder)?.join(&file.name);
        let request = ResizeRequest::new(&path).user_groups(user_groups);
        Some(self.resizer.evaluate(&request, self.notifier))
    }
}
