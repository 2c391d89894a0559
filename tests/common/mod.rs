//! Synthetic test images shared by the integration tests.

#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::Path;

/// Deterministic "photo-like" content: smooth gradients plus per-pixel noise
/// from a fixed LCG, so JPEG sizes shrink steadily with width.
pub fn photo(width: u32, height: u32) -> DynamicImage {
    let mut state: u32 = 0x1234_5678;
    let img = RgbImage::from_fn(width, height, |x, y| {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let noise = (state >> 24) as u8 / 4;
        let r = ((x * 255) / width.max(1)) as u8;
        let g = ((y * 255) / height.max(1)) as u8;
        let b = (((x + y) * 127) / (width + height).max(1)) as u8;
        Rgb([r.wrapping_add(noise), g.wrapping_add(noise), b.wrapping_add(noise)])
    });
    DynamicImage::ImageRgb8(img)
}

/// Encode `image` in `format` with the `image` crate's defaults.
pub fn encoded(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    let image = if format == ImageFormat::Gif {
        DynamicImage::ImageRgba8(image.to_rgba8())
    } else {
        image.clone()
    };
    image.write_to(&mut out, format).unwrap();
    out.into_inner()
}

/// Write a synthetic image file, creating parent directories.
pub fn write_photo(path: &Path, width: u32, height: u32, format: ImageFormat) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, encoded(&photo(width, height), format)).unwrap();
}
