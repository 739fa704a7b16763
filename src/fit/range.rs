//! Fit window selection.
//!
//! The mask shadow moves across the tube roughly linearly with the motor
//! position, so the pixel window is an affine function of `mask_pos`:
//!
//! ```text
//! left  = max(11,  trunc(0.23·mask_pos − 18))
//! right = min(244, trunc(0.25·mask_pos + 25))
//! ```
//!
//! The clip bounds keep the window clear of the tube ends, where counts drop
//! off for reasons unrelated to the mask.

use crate::domain::FitRange;

pub const FIT_LEFT_MIN: i64 = 11;
pub const FIT_RIGHT_MAX: i64 = 244;

/// Pixel window for a mask position.
pub fn fit_range(mask_pos: i64) -> FitRange {
    let (left, right) = unclipped_bounds(mask_pos);
    FitRange {
        left: left.max(FIT_LEFT_MIN),
        right: right.min(FIT_RIGHT_MAX),
    }
}

/// Window bounds before clipping. `as i64` truncates toward zero, also for
/// negative intermediates.
pub(crate) fn unclipped_bounds(mask_pos: i64) -> (i64, i64) {
    let m = mask_pos as f64;
    ((m * 0.23 - 18.0) as i64, (m * 0.25 + 25.0) as i64)
}

/// Expected lower sigmoid center for a mask position.
pub fn expected_x0(mask_pos: i64) -> f64 {
    0.23 * mask_pos as f64
}

/// Expected upper sigmoid center; the shadow widens slightly with tube index.
pub fn expected_x1(mask_pos: i64, tube: u32) -> f64 {
    0.23 * mask_pos as f64 + 10.0 + 0.06 * tube as f64
}
