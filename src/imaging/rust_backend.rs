//! Pure Rust image processing backend, no external binaries.
//!
//! Selected with `processor.tool = "builtin"`. Useful on hosts without
//! ImageMagick and as the reference backend for the test suite.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP, BMP, GIF, TGA) | `image` crate decoders |
//! | Orientation | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Resize | `image::imageops::resize` with `Lanczos3` filter |
//! | Encode → JPEG | `JpegEncoder::new_with_quality` |
//! | Encode → AVIF | `AvifEncoder` (rav1e, speed 6) |
//! | Encode → other | `DynamicImage::write_to` |
//!
//! Encoders never write EXIF, so `keep_metadata` cannot be honored here; the
//! metadata is always stripped.

use super::backend::{BackendError, ImageBackend, ImageInfo, ImageMetadata};
use super::calculations::fit_within;
use super::params::ResizeParams;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use std::collections::BTreeMap;
use std::io::BufWriter;
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_error(path: &Path, e: impl std::fmt::Display) -> BackendError {
    BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
}

/// Open a decoder, sniffing the format from content rather than extension.
fn open_reader(path: &Path) -> Result<ImageReader<std::io::BufReader<std::fs::File>>, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)
}

/// Load and decode an image, optionally applying its EXIF orientation.
fn load_image(path: &Path, auto_orient: bool) -> Result<DynamicImage, BackendError> {
    let mut decoder = open_reader(path)?
        .into_decoder()
        .map_err(|e| decode_error(path, e))?;
    let orientation = if auto_orient {
        decoder.orientation().ok()
    } else {
        None
    };
    let mut img = DynamicImage::from_decoder(decoder).map_err(|e| decode_error(path, e))?;
    if let Some(orientation) = orientation {
        img.apply_orientation(orientation);
    }
    Ok(img)
}

fn output_format(path: &Path) -> Result<ImageFormat, BackendError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    ImageFormat::from_extension(&ext)
        .filter(|f| f.writing_enabled())
        .ok_or_else(|| {
            BackendError::ProcessingFailed(format!("Unsupported output format: {}", ext))
        })
}

/// Save a DynamicImage to the given path, inferring format from extension.
fn save_image(img: &DynamicImage, path: &Path, quality: u32) -> Result<(), BackendError> {
    let format = output_format(path)?;
    let file = std::fs::File::create(path).map_err(BackendError::Io)?;
    let mut writer = BufWriter::new(file);
    let encode_failed =
        |e: image::ImageError| BackendError::ProcessingFailed(format!("{format:?} encode failed: {e}"));

    match format {
        ImageFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            let encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut writer, quality as u8);
            rgb.write_with_encoder(encoder).map_err(encode_failed)
        }
        ImageFormat::Avif => {
            let encoder = image::codecs::avif::AvifEncoder::new_with_speed_quality(
                &mut writer,
                6,
                quality as u8,
            );
            img.write_with_encoder(encoder).map_err(encode_failed)
        }
        other => img.write_to(&mut writer, other).map_err(encode_failed),
    }
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<ImageInfo, BackendError> {
        let mut decoder = open_reader(path)?
            .into_decoder()
            .map_err(|e| decode_error(path, e))?;
        let (width, height) = decoder.dimensions();
        let has_alpha = decoder.color_type().has_alpha();
        // Unreadable EXIF counts as upright
        let rotated = !matches!(decoder.orientation(), Ok(Orientation::NoTransforms) | Err(_));
        Ok(ImageInfo {
            width,
            height,
            has_alpha,
            rotated,
        })
    }

    fn read_metadata(&self, path: &Path) -> Result<ImageMetadata, BackendError> {
        let reader = open_reader(path)?;
        let format = reader.format();
        let decoder = reader.into_decoder().map_err(|e| decode_error(path, e))?;
        let (width, height) = decoder.dimensions();

        let mut raw = BTreeMap::new();
        if let Some(format) = format {
            raw.insert("format".to_string(), format!("{format:?}"));
        }
        raw.insert(
            "color_type".to_string(),
            format!("{:?}", decoder.color_type()),
        );
        Ok(ImageMetadata { width, height, raw })
    }

    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
        if params.keep_metadata {
            tracing::debug!(
                source = %params.source.display(),
                "builtin backend cannot keep metadata; it will be stripped"
            );
        }
        let img = load_image(&params.source, params.auto_orient)?;
        let (width, height) = fit_within(
            (img.width(), img.height()),
            (params.max_width, params.max_height),
        );
        let resized = if (width, height) == (img.width(), img.height()) {
            img
        } else {
            img.resize_exact(width, height, FilterType::Lanczos3)
        };
        save_image(&resized, &params.output, params.quality.value())
    }
}
