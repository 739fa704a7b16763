//! Linear least squares solver.
//!
//! Every Levenberg–Marquardt step solves a small, tall linear problem:
//!
//! ```text
//! minimize ‖A δ - b‖²
//! ```
//!
//! where `A` stacks the weighted Jacobian on top of the damping rows.
//!
//! Implementation choices:
//! - SVD handles tall matrices directly and degrades gracefully when two
//!   parameters are nearly collinear (e.g. a sigmoid center far outside the
//!   fit window, where its column in the Jacobian is almost zero).
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.)
//! - The parameter dimension is 7, so SVD cost is negligible next to the
//!   model evaluations.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Moore–Penrose inverse of a small symmetric matrix (e.g. `JᵀJ`).
///
/// Returns `None` if the decomposition fails or produces non-finite entries.
pub fn pseudo_inverse(m: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let eps = f64::EPSILON * m.nrows().max(1) as f64 * m.amax().max(1.0);
    let inv = m.clone().pseudo_inverse(eps).ok()?;
    if inv.iter().all(|v| v.is_finite()) {
        Some(inv)
    } else {
        None
    }
}
