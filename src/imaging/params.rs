//! Parameter types for encode operations.
//!
//! These types describe *what* to encode, not *how*. They are the interface
//! between the [`search`](crate::search) loop (which decides widths) and the
//! [`backend`](super::backend) (which does the pixel and codec work).
//!
//! ## Types
//!
//! - [`Quality`]: JPEG quality (1–100, default 80). Clamped on construction.
//! - [`GifOptions`]: NeuQuant palette quantizer speed for GIF output.
//! - [`OutputFormat`]: one of the three supported output formats, parsed from a tag.
//! - [`EncodeConfig`]: exactly one format plus its format-specific options.

use super::backend::BackendError;
use image::ImageFormat;
use std::fmt;

/// Default JPEG quality.
pub const DEFAULT_QUALITY: u8 = 80;

/// Quality setting for lossy JPEG encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u8);

impl Quality {
    pub fn new(value: u8) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(DEFAULT_QUALITY)
    }
}

/// GIF encoder options.
///
/// - `speed`: NeuQuant sampling speed, 1 (best palette, slowest) to 30 (fastest).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GifOptions {
    pub speed: i32,
}

impl GifOptions {
    pub fn new(speed: i32) -> Self {
        Self {
            speed: speed.clamp(1, 30),
        }
    }
}

impl Default for GifOptions {
    fn default() -> Self {
        Self { speed: 10 }
    }
}

/// Output formats the encoder supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Jpeg,
    Png,
    Gif,
}

impl OutputFormat {
    /// Parse a format tag. Case-insensitive; `jpg` is an alias of `jpeg`.
    pub fn from_tag(tag: &str) -> Result<Self, BackendError> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "gif" => Ok(Self::Gif),
            _ => Err(BackendError::UnsupportedFormat(tag.to_string())),
        }
    }

    /// Map a detected input format onto an output format.
    pub fn from_image_format(format: ImageFormat) -> Result<Self, BackendError> {
        match format {
            ImageFormat::Jpeg => Ok(Self::Jpeg),
            ImageFormat::Png => Ok(Self::Png),
            ImageFormat::Gif => Ok(Self::Gif),
            other => Err(BackendError::UnsupportedFormat(format!("{other:?}"))),
        }
    }

    /// Canonical tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Gif => "gif",
        }
    }

    /// File extension for batch output paths.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full encode configuration: one format and its options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeConfig {
    Jpeg { quality: Quality },
    Png,
    Gif(GifOptions),
}

impl EncodeConfig {
    /// Build the configuration for `format`. `quality` only applies to JPEG,
    /// `gif` only to GIF.
    pub fn new(format: OutputFormat, quality: Quality, gif: GifOptions) -> Self {
        match format {
            OutputFormat::Jpeg => Self::Jpeg { quality },
            OutputFormat::Png => Self::Png,
            OutputFormat::Gif => Self::Gif(gif),
        }
    }

    pub fn format(&self) -> OutputFormat {
        match self {
            Self::Jpeg { .. } => OutputFormat::Jpeg,
            Self::Png => OutputFormat::Png,
            Self::Gif(_) => OutputFormat::Gif,
        }
    }
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self::Jpeg {
            quality: Quality::default(),
        }
    }
}

/// Resolve the encode configuration from a requested tag and the format the
/// input was decoded as.
///
/// An empty tag reuses the decoded format. Fails with
/// [`BackendError::UnsupportedFormat`] for any tag outside jpeg/jpg/png/gif.
pub fn resolve_encode_config(
    tag: &str,
    decoded: ImageFormat,
    quality: Quality,
    gif: GifOptions,
) -> Result<EncodeConfig, BackendError> {
    let format = if tag.trim().is_empty() {
        OutputFormat::from_image_format(decoded)?
    } else {
        OutputFormat::from_tag(tag)?
    };
    Ok(EncodeConfig::new(format, quality, gif))
}
