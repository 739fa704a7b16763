//! Levenberg–Marquardt nonlinear least squares.
//!
//! Given a residual vector `r(p)` (already divided by the per-point errors)
//! and its Jacobian `J = ∂r/∂p`, we iterate:
//!
//! ```text
//! minimize ‖J δ + r‖² + λ Σ d_j δ_j²      (d_j = ‖J_j‖², Marquardt scaling)
//! ```
//!
//! solved as a stacked linear least squares problem with the SVD solver from
//! `ols`. Accepted steps shrink `λ`, rejected steps grow it.
//!
//! Termination:
//! - converged: relative cost reduction below `ftol`, step below `xtol`
//!   (relative to the parameter norm), or gradient max-norm below `gtol`
//! - failed: residual-evaluation budget exhausted, `λ` overflow, or
//!   non-finite residuals at the starting point

use nalgebra::{DMatrix, DVector};

use crate::error::FitError;
use crate::math::solve_least_squares;

const LAMBDA_MIN: f64 = 1e-15;
const LAMBDA_MAX: f64 = 1e16;
const SCALE_FLOOR: f64 = 1e-12;

/// A weighted nonlinear least squares problem.
pub trait LeastSquaresProblem {
    /// Number of residuals.
    fn residual_count(&self) -> usize;

    /// Weighted residuals `r_i(p)`.
    fn residuals(&self, params: &DVector<f64>) -> DVector<f64>;

    /// Jacobian `∂r_i/∂p_j` (`residual_count × params.len()`).
    fn jacobian(&self, params: &DVector<f64>) -> DMatrix<f64>;
}

/// Solver tolerances and budget.
#[derive(Debug, Clone, Copy)]
pub struct LmOptions {
    pub max_evaluations: usize,
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
    pub lambda_init: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_evaluations: 1600,
            ftol: 1.49012e-8,
            xtol: 1.49012e-8,
            gtol: 1e-10,
            lambda_init: 1e-3,
        }
    }
}

/// Why the solver stopped successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
    Cost,
    Step,
    Gradient,
}

/// Converged solution.
#[derive(Debug, Clone)]
pub struct LmReport {
    pub params: DVector<f64>,
    /// Final `‖r‖²` (chi-square for error-weighted residuals).
    pub cost: f64,
    /// `JᵀJ` at the solution (for covariance estimates).
    pub jtj: DMatrix<f64>,
    pub evaluations: usize,
    pub iterations: usize,
    pub convergence: Convergence,
}

/// Minimize `‖r(p)‖²` starting from `initial`.
pub fn levenberg_marquardt<P: LeastSquaresProblem>(
    problem: &P,
    initial: DVector<f64>,
    opts: &LmOptions,
) -> Result<LmReport, FitError> {
    let n = problem.residual_count();
    let m = initial.len();
    if n < m {
        return Err(FitError::TooFewPoints { points: n, params: m });
    }

    let mut params = initial;
    let mut r = problem.residuals(&params);
    let mut evaluations = 1usize;
    let mut cost = r.norm_squared();
    if !cost.is_finite() {
        return Err(FitError::NotConverged("non-finite residuals at the initial guess".to_string()));
    }

    let mut jac = problem.jacobian(&params);
    let mut lambda = opts.lambda_init;
    let mut iterations = 0usize;

    if cost == 0.0 {
        return finish(params, cost, &jac, evaluations, iterations, Convergence::Cost);
    }

    loop {
        iterations += 1;

        let gradient = jac.tr_mul(&r);
        if !gradient.iter().all(|g| g.is_finite()) {
            return Err(FitError::NotConverged("non-finite Jacobian".to_string()));
        }
        if gradient.amax() <= opts.gtol {
            return finish(params, cost, &jac, evaluations, iterations, Convergence::Gradient);
        }

        let scale: Vec<f64> = jac
            .column_iter()
            .map(|c| c.norm_squared().max(SCALE_FLOOR))
            .collect();

        // Inner loop: raise damping until a step lowers the cost.
        loop {
            if evaluations >= opts.max_evaluations {
                return Err(FitError::NotConverged(format!(
                    "evaluation budget of {} exhausted (cost={cost:.4e})",
                    opts.max_evaluations
                )));
            }

            let mut a = DMatrix::<f64>::zeros(n + m, m);
            a.view_mut((0, 0), (n, m)).copy_from(&jac);
            let mut b = DVector::<f64>::zeros(n + m);
            b.rows_mut(0, n).copy_from(&(-&r));
            for (j, &d) in scale.iter().enumerate() {
                a[(n + j, j)] = (lambda * d).sqrt();
            }

            let Some(step) = solve_least_squares(&a, &b) else {
                lambda *= 10.0;
                if lambda > LAMBDA_MAX {
                    return Err(FitError::NotConverged("singular damped system".to_string()));
                }
                continue;
            };

            let step_small = step.norm() <= opts.xtol * (params.norm() + opts.xtol);
            let candidate = &params + &step;
            let r_new = problem.residuals(&candidate);
            evaluations += 1;
            let cost_new = r_new.norm_squared();

            if cost_new.is_finite() && cost_new < cost {
                let reduction = (cost - cost_new) / cost;
                params = candidate;
                r = r_new;
                cost = cost_new;
                jac = problem.jacobian(&params);
                lambda = (lambda / 10.0).max(LAMBDA_MIN);

                log::trace!("lm iter={iterations} cost={cost:.6e} lambda={lambda:.1e}");

                if reduction <= opts.ftol {
                    return finish(params, cost, &jac, evaluations, iterations, Convergence::Cost);
                }
                if step_small {
                    return finish(params, cost, &jac, evaluations, iterations, Convergence::Step);
                }
                break;
            }

            // Rejected. A vanishing step means we are sitting on the minimum.
            if step_small {
                return finish(params, cost, &jac, evaluations, iterations, Convergence::Step);
            }
            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                return Err(FitError::NotConverged(format!(
                    "damping exceeded {LAMBDA_MAX:.0e} without reducing cost"
                )));
            }
        }
    }
}

fn finish(
    params: DVector<f64>,
    cost: f64,
    jac: &DMatrix<f64>,
    evaluations: usize,
    iterations: usize,
    convergence: Convergence,
) -> Result<LmReport, FitError> {
    Ok(LmReport {
        params,
        cost,
        jtj: jac.tr_mul(jac),
        evaluations,
        iterations,
        convergence,
    })
}
