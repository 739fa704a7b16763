//! Diagnostic plot data and the terminal ASCII renderer.
//!
//! A `DiagnosticPlot` is computed once from a fit (observed points with error
//! bars, the fitted curve sampled over the fit window, axis bounds) and can
//! then be rendered either as plain text (`ascii`) or in the interactive
//! chart (`crate::tui`).

pub mod ascii;

pub use ascii::*;

use crate::fit::FitOutcome;
use crate::models::sample_curve;

/// Y-axis clamp used for mask scans (counts).
pub const DEFAULT_Y_BOUNDS: [f64; 2] = [-10.0, 950.0];

/// Number of curve samples across the fit window.
const CURVE_SAMPLES: usize = 300;

/// Render-ready description of one fit.
#[derive(Debug, Clone)]
pub struct DiagnosticPlot {
    pub title: String,
    /// `(pixel, counts, error)` for every point that entered the fit.
    pub points: Vec<(f64, f64, f64)>,
    pub curve: Vec<(f64, f64)>,
    pub x_bounds: [f64; 2],
    /// `None` means "fit the data range".
    pub y_bounds: Option<[f64; 2]>,
    pub edge: f64,
    pub width: f64,
}

impl DiagnosticPlot {
    pub fn from_fit(fit: &FitOutcome, y_bounds: Option<[f64; 2]>) -> Self {
        let x0 = fit.range.left as f64;
        let x1 = fit.range.right as f64;
        let estimate = fit.estimate();
        Self {
            title: format!("tube {} | mask {} | run {}", fit.target.tube, fit.target.mask_pos, fit.target.run),
            points: fit.points.iter().map(|p| (p.pixel as f64, p.counts, p.error)).collect(),
            curve: sample_curve(&fit.params, x0, x1, CURVE_SAMPLES),
            x_bounds: [x0, x1],
            y_bounds,
            edge: estimate.edge,
            width: estimate.width,
        }
    }

    /// Y bounds to draw with: the clamp if set, else the padded data range.
    pub fn resolved_y_bounds(&self) -> [f64; 2] {
        if let Some(b) = self.y_bounds {
            return b;
        }
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for &(_, y, e) in &self.points {
            lo = lo.min(y - e);
            hi = hi.max(y + e);
        }
        for &(_, y) in &self.curve {
            lo = lo.min(y);
            hi = hi.max(y);
        }
        if !(lo.is_finite() && hi.is_finite() && hi > lo) {
            return DEFAULT_Y_BOUNDS;
        }
        let pad = ((hi - lo) * 0.05).max(1e-12);
        [lo - pad, hi + pad]
    }
}
