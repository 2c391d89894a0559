//! Pure Rust image backend built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF) | `image::ImageReader` with signature sniffing |
//! | Resample | `image::DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (quality 1–100) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (default compression) |
//! | Encode → GIF | `image::codecs::gif::GifEncoder` (NeuQuant palette) |
//!
//! Re-encoding never carries EXIF/IPTC segments over, so every output is
//! stripped of source metadata.

use super::backend::{BackendError, ImageBackend};
use super::calculations::scaled_dimensions;
use super::params::EncodeConfig;
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, GenericImageView, ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::Path;

/// Input formats recognized by signature, with the extensions batch mode picks up.
const INPUT_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("gif", ImageFormat::Gif),
];

/// Whether a path has an extension batch mode should process.
pub fn is_supported_input(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            INPUT_CANDIDATES
                .iter()
                .any(|(candidate, _)| ext.eq_ignore_ascii_case(candidate))
        })
}

/// Decode image bytes, detecting the format from its signature.
///
/// Only JPEG, PNG and GIF signatures are accepted; anything else is a
/// [`BackendError::Decode`].
pub fn decode(bytes: &[u8]) -> Result<(DynamicImage, ImageFormat), BackendError> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let format = reader
        .format()
        .filter(|f| INPUT_CANDIDATES.iter().any(|(_, c)| c == f))
        .ok_or_else(|| BackendError::Decode("unrecognized image signature".into()))?;
    let image = reader
        .decode()
        .map_err(|e| BackendError::Decode(format!("{format:?} data: {e}")))?;
    Ok((image, format))
}

/// Read and decode an image file.
pub fn load_image(path: &Path) -> Result<(DynamicImage, ImageFormat), BackendError> {
    let bytes = std::fs::read(path)?;
    decode(&bytes).map_err(|e| match e {
        BackendError::Decode(msg) => {
            BackendError::Decode(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })
}

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

fn encode_jpeg(image: &DynamicImage, quality: u8, sink: &mut Vec<u8>) -> image::ImageResult<()> {
    let encoder = JpegEncoder::new_with_quality(&mut *sink, quality);
    // JPEG has no alpha channel and no 16-bit mode
    match image {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageLuma8(_) => {
            image.write_with_encoder(encoder)
        }
        _ => DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder),
    }
}

fn encode_png(image: &DynamicImage, sink: &mut Vec<u8>) -> image::ImageResult<()> {
    let encoder = PngEncoder::new(&mut *sink);
    match image {
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
            DynamicImage::ImageRgba8(image.to_rgba8()).write_with_encoder(encoder)
        }
        _ => image.write_with_encoder(encoder),
    }
}

fn encode_gif(image: &DynamicImage, speed: i32, sink: &mut Vec<u8>) -> image::ImageResult<()> {
    let (width, height) = image.dimensions();
    let rgba = image.to_rgba8();
    // The trailer is written when the encoder drops
    let mut encoder = GifEncoder::new_with_speed(&mut *sink, speed);
    encoder.encode(rgba.as_raw(), width, height, ExtendedColorType::Rgba8)
}

impl ImageBackend for RustBackend {
    fn resample(&self, image: &DynamicImage, width: u32) -> Result<DynamicImage, BackendError> {
        let (w, h) = scaled_dimensions(image.dimensions(), width);
        if image.width() == 0 || image.height() == 0 {
            return Err(BackendError::Resample("source image is empty".into()));
        }
        Ok(image.resize_exact(w, h, FilterType::Lanczos3))
    }

    fn encode(
        &self,
        image: &DynamicImage,
        config: &EncodeConfig,
        sink: &mut Vec<u8>,
    ) -> Result<usize, BackendError> {
        let start = sink.len();
        let result = match config {
            EncodeConfig::Jpeg { quality } => encode_jpeg(image, quality.value(), sink),
            EncodeConfig::Png => encode_png(image, sink),
            EncodeConfig::Gif(options) => encode_gif(image, options.speed, sink),
        };
        result.map_err(|e| {
            BackendError::Encode(format!("{} encode failed: {}", config.format(), e))
        })?;
        Ok(sink.len() - start)
    }
}
