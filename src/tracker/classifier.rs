//! Card classification by brightness and gold pixel counting.
//!
//! Both checks are coarse color heuristics over a cropped card image:
//! face-down cards render near black, and the gold indicator shows up as a
//! run of orange-brown pixels inside a thin horizontal scan strip.

use image::Rgb;

use crate::capture::PixelBuffer;
use crate::tracker::config::DetectionConfig;

/// Default brightness separating face-down from flipped cards.
/// Face-down cards render near black (#040001).
pub const BRIGHTNESS_THRESHOLD: f32 = 20.0;

/// Default per-channel tolerance around each gold target.
pub const GOLD_TOLERANCE: u8 = 15;

/// Reference colors of the gold indicator. Rendering varies slightly,
/// so a pixel matching either one counts (#B47834 and #C17E25).
pub const GOLD_TARGETS: [[u8; 3]; 2] = [[180, 120, 52], [193, 126, 37]];

/// Mean of every channel value in the buffer (0.0 for an empty buffer).
pub fn mean_brightness(buffer: &PixelBuffer) -> f32 {
    let raw = buffer.as_raw();
    if raw.is_empty() {
        return 0.0;
    }
    let total: u64 = raw.iter().map(|&v| v as u64).sum();
    (total as f64 / raw.len() as f64) as f32
}

/// Returns true when the card's mean brightness is above `threshold`.
pub fn is_flipped(buffer: &PixelBuffer, threshold: f32) -> bool {
    mean_brightness(buffer) > threshold
}

/// Inclusive per-channel bounds around one target color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ColorRange {
    lower: [u8; 3],
    upper: [u8; 3],
}

impl ColorRange {
    fn around(target: [u8; 3], tolerance: u8) -> Self {
        Self {
            lower: target.map(|c| c.saturating_sub(tolerance)),
            upper: target.map(|c| c.saturating_add(tolerance)),
        }
    }

    fn contains(&self, pixel: &Rgb<u8>) -> bool {
        (0..3).all(|i| self.lower[i] <= pixel[i] && pixel[i] <= self.upper[i])
    }
}

/// Counts pixels within tolerance of any gold target color.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GoldMatcher {
    ranges: Vec<ColorRange>,
}

impl Default for GoldMatcher {
    fn default() -> Self {
        Self::new(&GOLD_TARGETS, GOLD_TOLERANCE)
    }
}

impl GoldMatcher {
    pub fn new(targets: &[[u8; 3]], tolerance: u8) -> Self {
        Self {
            ranges: targets
                .iter()
                .map(|&t| ColorRange::around(t, tolerance))
                .collect(),
        }
    }

    pub fn from_config(detection: &DetectionConfig) -> Self {
        Self::new(&detection.gold_targets, detection.gold_tolerance)
    }

    pub fn is_gold(&self, pixel: &Rgb<u8>) -> bool {
        self.ranges.iter().any(|range| range.contains(pixel))
    }
}

/// Number of gold pixels in rows `scan_y_start..scan_y_end`, clamped to the buffer.
pub fn count_gold_pixels(
    buffer: &PixelBuffer,
    scan_y_start: u32,
    scan_y_end: u32,
    matcher: &GoldMatcher,
) -> u32 {
    let y_start = scan_y_start.min(buffer.height());
    let y_end = scan_y_end.min(buffer.height());
    if y_start >= y_end {
        return 0;
    }

    buffer
        .rows()
        .skip(y_start as usize)
        .take((y_end - y_start) as usize)
        .flatten()
        .filter(|pixel| matcher.is_gold(pixel))
        .count() as u32
}
