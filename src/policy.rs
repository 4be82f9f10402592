//! Size and resolution limits applied during ingestion.
//!
//! Everything here is a pure function so the thresholds can be tested without
//! touching the file system or a codec.

/// Character budget for the accumulated text bundle.
///
/// Above this, the bundle is likely to exceed the model's context window, so
/// the caller is asked whether to truncate.
pub const MAX_RAW_CHARS: usize = 200_000;

/// Longest edge, in pixels, of an image sent to the model.
pub const MAX_IMAGE_EDGE: u32 = 1200;

/// JPEG quality used when re-encoding images.
pub const JPEG_QUALITY: u8 = 85;

/// Number of characters (Unicode scalar values) in `text`.
pub fn char_count(text: &str) -> usize {
    text.chars().count()
}

/// `true` when `text` holds more than `budget` characters.
pub fn exceeds_budget(text: &str, budget: usize) -> bool {
    // `nth` stops early instead of counting a multi-megabyte bundle.
    text.chars().nth(budget).is_some()
}

/// Truncate `text` in place to at most `budget` characters.
///
/// Cuts on a character boundary, so the result always holds exactly
/// `budget` characters when the input was longer.
pub fn truncate_to_budget(text: &mut String, budget: usize) {
    if let Some((byte_idx, _)) = text.char_indices().nth(budget) {
        text.truncate(byte_idx);
    }
}

/// Compute the output dimensions for an image so neither edge exceeds
/// `max_edge`.
///
/// Images already within bounds are returned unchanged (no upscaling).
/// Otherwise the longer edge becomes exactly `max_edge` and the shorter edge
/// is scaled proportionally, rounded, and never below 1.
pub fn fit_within(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    if width <= max_edge && height <= max_edge {
        return (width, height);
    }

    let scale_short = |short: u32, long: u32| -> u32 {
        let scaled = (short as f64 * max_edge as f64 / long as f64).round() as u32;
        scaled.clamp(1, max_edge)
    };

    if width >= height {
        (max_edge, scale_short(height, width))
    } else {
        (scale_short(width, height), max_edge)
    }
}
