//! Logistic sigmoid.
//!
//! `σ(z) = 1 / (1 + e^{-z})`
//!
//! Numerical notes:
//! - The naive form overflows `e^{-z}` for large negative `z` (`z < -709`).
//!   We branch on the sign so the exponent is always `<= 0`.
//! - For `|z|` beyond ~37 the result saturates to exactly `0.0` / `1.0` in f64.

/// Compute `σ(z)` without overflow for any finite `z`.
pub fn expit(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Derivative `σ'(z) = σ(z) (1 - σ(z))`, given `s = σ(z)`.
pub fn expit_slope(s: f64) -> f64 {
    s * (1.0 - s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expit_midpoint_and_symmetry() {
        assert!((expit(0.0) - 0.5).abs() < 1e-15);
        for &z in &[0.1, 1.0, 5.0, 20.0] {
            assert!((expit(z) + expit(-z) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn expit_saturates_without_overflow() {
        for &z in &[-1e6, -800.0, -710.0, 710.0, 800.0, 1e6] {
            let v = expit(z);
            assert!(v.is_finite(), "expit({z}) = {v}");
            assert!((0.0..=1.0).contains(&v));
        }
        assert_eq!(expit(-1e6), 0.0);
        assert_eq!(expit(1e6), 1.0);
    }

    #[test]
    fn expit_slope_peaks_at_midpoint() {
        assert!((expit_slope(expit(0.0)) - 0.25).abs() < 1e-15);
        assert_eq!(expit_slope(expit(1e6)), 0.0);
    }
}
