//! Shared test utilities: synthetic images and a ready-made rule.
//!
//! Images are generated with the `image` encoders so tests never depend on
//! fixture files or on ImageMagick being installed.

use crate::rules::{ConversionMapping, DirectoryPattern, Rule};
use image::{ImageEncoder, RgbImage, RgbaImage};
use std::path::Path;

/// Gradient JPEG; compresses well, so the file stays small.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Gradient JPEG carrying an EXIF APP1 segment with the given orientation tag.
pub fn create_oriented_jpeg(path: &Path, width: u32, height: u32, orientation: u8) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut jpeg = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(&mut jpeg)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();

    // APP1: "Exif\0\0", big-endian TIFF header, one IFD entry (0x0112, SHORT)
    let mut app1 = vec![0xFF, 0xE1, 0x00, 0x22];
    app1.extend_from_slice(b"Exif\0\0");
    app1.extend_from_slice(b"MM\0\x2A\0\0\0\x08");
    app1.extend_from_slice(&[0x00, 0x01]);
    app1.extend_from_slice(&[0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
    app1.extend_from_slice(&[0x00, orientation, 0x00, 0x00]);
    app1.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    // Right after SOI
    jpeg.splice(2..2, app1);
    std::fs::write(path, jpeg).unwrap();
}

/// PNG, with a half-transparent alpha channel when `alpha` is set.
pub fn create_test_png(path: &Path, width: u32, height: u32, alpha: bool) {
    if alpha {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x % 256) as u8, (y % 256) as u8, 64, 128])
        });
        img.save_with_format(path, image::ImageFormat::Png).unwrap();
    } else {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 64])
        });
        img.save_with_format(path, image::ImageFormat::Png).unwrap();
    }
}

/// Rule for `uploads/`: jpg/jpeg/png/bmp above 1000 bytes, fit into 800x600,
/// `bmp => jpg`.
pub fn test_rule() -> Rule {
    Rule {
        description: Some("test".to_string()),
        directories: vec![DirectoryPattern::parse("uploads/")],
        file_types: ["jpg", "jpeg", "png", "bmp"].map(String::from).to_vec(),
        threshold: 1000,
        max_width: 800,
        max_height: 600,
        auto_orient: true,
        keep_metadata: false,
        resize_png_with_alpha: false,
        conversion_mapping: ConversionMapping::parse("bmp => jpg").unwrap(),
        user_groups: Vec::new(),
    }
}
