//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations every backend must
//! support: identify, read_metadata, and resize.
//!
//! | Backend | How it works |
//! |---|---|
//! | [`MagickBackend`](super::magick_backend::MagickBackend) | Shells out to ImageMagick or GraphicsMagick |
//! | [`RustBackend`](super::rust_backend::RustBackend) | Decodes and encodes in-process with the `image` crate |

use super::params::ResizeParams;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0} not found; install it or set processor.path")]
    ToolNotFound(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    /// The image carries an alpha channel.
    pub has_alpha: bool,
    /// The EXIF orientation asks for a rotation or flip before display.
    pub rotated: bool,
}

/// Metadata read back from a processed image.
///
/// `raw` holds whatever key/value pairs the backend could extract (EXIF tags
/// for the external tools, format and color type for the builtin backend).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub raw: BTreeMap<String, String>,
}

/// Trait for image processing backends.
///
/// `Sync` so one resizer can be shared by several request threads.
pub trait ImageBackend: Sync {
    /// Get image dimensions and whether it has an alpha channel.
    fn identify(&self, path: &Path) -> Result<ImageInfo, BackendError>;

    /// Read dimensions and embedded metadata.
    fn read_metadata(&self, path: &Path) -> Result<ImageMetadata, BackendError>;

    /// Execute a resize operation, writing `params.output`.
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError>;
}

impl<T: ImageBackend + ?Sized> ImageBackend for Box<T> {
    fn identify(&self, path: &Path) -> Result<ImageInfo, BackendError> {
        (**self).identify(path)
    }

    fn read_metadata(&self, path: &Path) -> Result<ImageMetadata, BackendError> {
        (**self).read_metadata(path)
    }

    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
        (**self).resize(params)
    }
}
