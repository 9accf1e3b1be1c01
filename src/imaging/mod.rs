//! Image processing: identify, resize, convert, read metadata.
//!
//! | Backend | Tool |
//! |---|---|
//! | [`MagickBackend`] | ImageMagick `convert`/`identify` or GraphicsMagick `gm` |
//! | [`RustBackend`] | `image` crate, in-process |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + the two implementations

pub mod backend;
mod calculations;
pub mod magick_backend;
mod params;
pub mod rust_backend;

use crate::config::{ProcessorConfig, Tool};

pub use backend::{BackendError, ImageBackend, ImageInfo, ImageMetadata};
pub use calculations::{fit_within, fits_within};
pub use magick_backend::{MagickBackend, MagickFlavor};
pub use params::{Quality, ResizeParams};
pub use rust_backend::RustBackend;

/// Build the backend selected by `processor.tool`.
pub fn backend_from_config(processor: &ProcessorConfig) -> Box<dyn ImageBackend> {
    match processor.tool {
        Tool::ImageMagick => Box::new(MagickBackend::new(
            MagickFlavor::ImageMagick,
            processor.binary_dir(),
        )),
        Tool::GraphicsMagick => Box::new(MagickBackend::new(
            MagickFlavor::GraphicsMagick,
            processor.binary_dir(),
        )),
        Tool::Builtin => Box::new(RustBackend::new()),
    }
}
