//! Model evaluation for the mask shadow.
//!
//! ```text
//! f(x) = base + slope·x + max_val·(σ(k0·(x − x0)) − σ(k1·(x − x1)))
//! ```
//!
//! A sloped linear background with two opposing logistic steps: the first
//! switches on at `x0`, the second cancels it at `x1`. With a negative
//! `max_val` this is a dip between `x0` and `x1` (the mask shadow).
//!
//! The fitter relies on two primitive operations:
//! - predict `f(x)` for a parameter vector (residuals, plots, synthetic data)
//! - the gradient `∂f/∂p` (Jacobian rows)

use crate::domain::{FitParams, PARAM_COUNT};
use crate::math::{expit, expit_slope};

/// Evaluate the model at `x`.
pub fn fit_func(x: f64, p: &FitParams) -> f64 {
    let s0 = expit(p.k0 * (x - p.x0));
    let s1 = expit(p.k1 * (x - p.x1));
    p.base + p.slope * x + p.max_val * (s0 - s1)
}

/// Gradient of `fit_func` with respect to the parameters, in `FitParams` vector order.
pub fn fit_func_gradient(x: f64, p: &FitParams) -> [f64; PARAM_COUNT] {
    let s0 = expit(p.k0 * (x - p.x0));
    let s1 = expit(p.k1 * (x - p.x1));
    let d0 = p.max_val * expit_slope(s0);
    let d1 = p.max_val * expit_slope(s1);

    [
        1.0,
        x,
        s0 - s1,
        d0 * (x - p.x0),
        -d0 * p.k0,
        -d1 * (x - p.x1),
        d1 * p.k1,
    ]
}

/// Sample the model on `n` evenly spaced points over `[x_min, x_max]`.
pub fn sample_curve(p: &FitParams, x_min: f64, x_max: f64, n: usize) -> Vec<(f64, f64)> {
    let n = n.max(2);
    (0..n)
        .map(|i| {
            let u = i as f64 / (n as f64 - 1.0);
            let x = x_min + u * (x_max - x_min);
            (x, fit_func(x, p))
        })
        .collect()
}
