/// Pixel size of an image, before or after scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Fit `(width, height)` inside the bounds, keeping the aspect ratio.
///
/// Images already inside the bounds are returned unchanged; nothing is ever
/// upscaled. Each scaled side is rounded to the nearest pixel and kept >= 1.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> Dimensions {
    if width <= max_width && height <= max_height {
        return Dimensions { width, height };
    }

    let ratio = f64::min(
        max_width as f64 / width as f64,
        max_height as f64 / height as f64,
    );

    Dimensions {
        width: ((width as f64 * ratio).round() as u32).max(1),
        height: ((height as f64 * ratio).round() as u32).max(1),
    }
}
