//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Whether `source` already fits inside the `max` bounding box.
pub fn fits_within(source: (u32, u32), max: (u32, u32)) -> bool {
    source.0 <= max.0 && source.1 <= max.1
}

/// Calculate the largest size that fits within a bounding box while keeping
/// the source aspect ratio.
///
/// Never enlarges: a source that already fits is returned unchanged. Neither
/// edge is rounded down to zero.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `max` - Bounding box (max width, max height)
///
/// # Examples
/// ```
/// # use image_autoresize::imaging::fit_within;
/// // 2000x1500 into 800x600 → exactly 800x600
/// assert_eq!(fit_within((2000, 1500), (800, 600)), (800, 600));
///
/// // Portrait 1500x2000 into 800x600 → height-bound 450x600
/// assert_eq!(fit_within((1500, 2000), (800, 600)), (450, 600));
/// ```
pub fn fit_within(source: (u32, u32), max: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (max_w, max_h) = max;

    if src_w == 0 || src_h == 0 || fits_within(source, max) {
        return source;
    }

    let scale = (max_w as f64 / src_w as f64).min(max_h as f64 / src_h as f64);
    let w = ((src_w as f64 * scale).round() as u32).clamp(1, max_w.max(1));
    let h = ((src_h as f64 * scale).round() as u32).clamp(1, max_h.max(1));
    (w, h)
}
