//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the resizer (which decides whether and how a file is
//! processed) and the [`backend`](super::backend) (which does the pixel work
//! or drives the external tool). The same params work for every backend, so
//! tests can swap in a mock without touching the decision logic.

use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

/// Parameters for a resize (and possibly convert) operation.
///
/// The output format follows the extension of `output`. Images are shrunk to
/// fit within `max_width` x `max_height` with the aspect ratio preserved and
/// are never enlarged.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub max_width: u32,
    pub max_height: u32,
    /// Apply the EXIF orientation before resizing.
    pub auto_orient: bool,
    /// Keep embedded metadata; stripped otherwise.
    pub keep_metadata: bool,
    pub quality: Quality,
}
