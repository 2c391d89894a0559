//! Image backend trait and shared error type.
//!
//! The [`ImageBackend`] trait is the port the size search drives: resample a
//! raster to a width, and encode a raster with an [`EncodeConfig`] into a byte
//! sink. The search never touches pixels or codecs itself, which keeps the
//! convergence logic testable against a mock with a synthetic size curve.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate.

use super::params::EncodeConfig;
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Unsupported output format: {0:?}")]
    UnsupportedFormat(String),
    #[error("Encode failed: {0}")]
    Encode(String),
    #[error("Resample failed: {0}")]
    Resample(String),
}

/// Trait for image backends.
///
/// Implementations must be deterministic: the same image and configuration
/// always yield the same bytes. The binary search relies on it.
pub trait ImageBackend: Sync {
    /// Resample to `width`, deriving the height from the aspect ratio.
    fn resample(&self, image: &DynamicImage, width: u32) -> Result<DynamicImage, BackendError>;

    /// Encode `image` and append the bytes to `sink`.
    ///
    /// Returns the exact number of bytes appended.
    fn encode(
        &self,
        image: &DynamicImage,
        config: &EncodeConfig,
        sink: &mut Vec<u8>,
    ) -> Result<usize, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::calculations::scaled_dimensions;
    use image::GenericImageView;
    use std::sync::Mutex;

    type SizeCurve = Box<dyn Fn(u32, u32) -> usize + Send + Sync>;

    /// Mock backend that records operations and fabricates encodings.
    ///
    /// Resampling produces a blank raster of the right dimensions; encoding
    /// writes `size_of(width, height)` bytes derived from the dimensions, so
    /// two encodes at the same width are byte-identical.
    /// Uses Mutex (not RefCell) so it is Sync.
    pub struct MockBackend {
        size_of: SizeCurve,
        pub fail_encode_at: Option<u32>,
        pub fail_resample_at: Option<u32>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Resample { width: u32, height: u32 },
        Encode { width: u32, height: u32, size: usize },
    }

    impl MockBackend {
        pub fn with_curve(size_of: impl Fn(u32, u32) -> usize + Send + Sync + 'static) -> Self {
            Self {
                size_of: Box::new(size_of),
                fail_encode_at: None,
                fail_resample_at: None,
                operations: Mutex::new(Vec::new()),
            }
        }

        /// Size proportional to pixel area, like a real codec on uniform content.
        pub fn per_pixel(bytes_per_pixel: f64) -> Self {
            Self::with_curve(move |w, h| ((w as f64 * h as f64) * bytes_per_pixel).ceil() as usize)
        }

        /// Every encode has the same size regardless of width.
        pub fn fixed(size: usize) -> Self {
            Self::with_curve(move |_, _| size)
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn encode_widths(&self) -> Vec<u32> {
            self.get_operations()
                .into_iter()
                .filter_map(|op| match op {
                    RecordedOp::Encode { width, .. } => Some(width),
                    _ => None,
                })
                .collect()
        }
    }

    impl ImageBackend for MockBackend {
        fn resample(&self, image: &DynamicImage, width: u32) -> Result<DynamicImage, BackendError> {
            let (w, h) = scaled_dimensions(image.dimensions(), width);
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Resample { width: w, height: h });
            if self.fail_resample_at == Some(w) {
                return Err(BackendError::Resample(format!("mock failure at {w}")));
            }
            Ok(DynamicImage::new_luma8(w, h))
        }

        fn encode(
            &self,
            image: &DynamicImage,
            _config: &EncodeConfig,
            sink: &mut Vec<u8>,
        ) -> Result<usize, BackendError> {
            let (width, height) = image.dimensions();
            if self.fail_encode_at == Some(width) {
                return Err(BackendError::Encode(format!("mock failure at {width}")));
            }
            let size = (self.size_of)(width, height);
            sink.extend((0..size).map(|i| (i as u32 ^ width) as u8));
            self.operations.lock().unwrap().push(RecordedOp::Encode {
                width,
                height,
                size,
            });
            Ok(size)
        }
    }

    #[test]
    fn mock_records_resample() {
        let backend = MockBackend::fixed(10);
        let img = DynamicImage::new_luma8(800, 600);

        let resized = backend.resample(&img, 400).unwrap();
        assert_eq!(resized.dimensions(), (400, 300));

        let ops = backend.get_operations();
        assert_eq!(
            ops,
            vec![RecordedOp::Resample {
                width: 400,
                height: 300
            }]
        );
    }

    #[test]
    fn mock_encode_appends_exact_byte_count() {
        let backend = MockBackend::per_pixel(0.5);
        let img = DynamicImage::new_luma8(10, 10);
        let mut sink = vec![1, 2, 3];

        let n = backend
            .encode(&img, &EncodeConfig::default(), &mut sink)
            .unwrap();
        assert_eq!(n, 50);
        assert_eq!(sink.len(), 53);
    }

    #[test]
    fn mock_encode_failure_injected() {
        let mut backend = MockBackend::fixed(10);
        backend.fail_encode_at = Some(32);
        let img = DynamicImage::new_luma8(32, 32);
        let result = backend.encode(&img, &EncodeConfig::Png, &mut Vec::new());
        assert!(matches!(result, Err(BackendError::Encode(_))));
        assert!(backend.get_operations().is_empty());
    }
}
