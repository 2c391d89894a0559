//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Height that keeps the source aspect ratio at the given width.
///
/// Rounded to the nearest pixel and never below 1, so very wide sources
/// still produce a valid raster at small widths.
///
/// # Examples
/// ```
/// # use downsize::imaging::scaled_height;
/// assert_eq!(scaled_height((2000, 1500), 1000), 750);
/// assert_eq!(scaled_height((1000, 1), 10), 1);
/// ```
pub fn scaled_height(source: (u32, u32), width: u32) -> u32 {
    let (src_w, src_h) = source;
    if src_w == 0 {
        return src_h.max(1);
    }
    let h = (width as f64 * src_h as f64 / src_w as f64).round() as u32;
    h.max(1)
}

/// Dimensions of a resample to `width`, preserving aspect ratio.
pub fn scaled_dimensions(source: (u32, u32), width: u32) -> (u32, u32) {
    let width = width.max(1);
    (width, scaled_height(source, width))
}
