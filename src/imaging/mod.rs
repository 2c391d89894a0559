//! Image processing: decode, resample and encode, all on the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader::with_guessed_format` (JPEG, PNG, GIF) |
//! | **Resample** | `resize_exact` with Lanczos3, height from aspect ratio |
//! | **Encode** | JPEG (quality), PNG, GIF (palette speed) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Output format and encode configuration types
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend};
pub use calculations::{scaled_dimensions, scaled_height};
pub use params::{
    DEFAULT_QUALITY, EncodeConfig, GifOptions, OutputFormat, Quality, resolve_encode_config,
};
pub use rust_backend::{RustBackend, decode, is_supported_input, load_image};
