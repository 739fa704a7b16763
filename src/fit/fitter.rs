//! Single-position fit.
//!
//! Given:
//! - a mask position, run number and tube index
//! - a seed parameter vector for the tube
//!
//! we:
//! - reseed the sigmoid centers `x0`/`x1` from the mask geometry (the seed's
//!   own centers are ignored)
//! - load the scan and keep the rows inside the fit window
//! - minimize `Σ ((y_i − f(x_i)) / σ_i)²` with Levenberg–Marquardt
//!
//! and return the refined parameters plus their covariance.

use std::path::Path;

use nalgebra::{DMatrix, DVector};

use crate::domain::{EdgeEstimate, FitParams, FitRange, PARAM_COUNT, ScanData, ScanPoint, SeedGuess};
use crate::error::FitError;
use crate::fit::range::{expected_x0, expected_x1, fit_range};
use crate::io::scan::{load_scan, scan_path};
use crate::math::{LeastSquaresProblem, LmOptions, levenberg_marquardt, pseudo_inverse};
use crate::models::{fit_func, fit_func_gradient};

/// Identifies one fit in the sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitTarget {
    pub tube: u32,
    pub mask_pos: i64,
    pub run: i64,
}

/// A converged fit for one (tube, mask position).
#[derive(Debug, Clone)]
pub struct FitOutcome {
    pub target: FitTarget,
    pub range: FitRange,
    /// Scan rows that entered the fit.
    pub points: Vec<ScanPoint>,
    /// Starting vector actually handed to the optimizer.
    pub guess: FitParams,
    pub params: FitParams,
    /// Parameter covariance, scaled by the reduced chi-square.
    pub covariance: Option<DMatrix<f64>>,
    pub chi2: f64,
    pub evaluations: usize,
}

impl FitOutcome {
    pub fn estimate(&self) -> EdgeEstimate {
        self.params.edge()
    }

    /// 1σ uncertainties from the covariance diagonal.
    pub fn std_errors(&self) -> Option<[f64; PARAM_COUNT]> {
        let cov = self.covariance.as_ref()?;
        let mut out = [0.0; PARAM_COUNT];
        for (j, slot) in out.iter_mut().enumerate() {
            let v = cov[(j, j)];
            if !(v.is_finite() && v >= 0.0) {
                return None;
            }
            *slot = v.sqrt();
        }
        Some(out)
    }

    /// Degrees of freedom of the fit (`points − parameters`).
    pub fn dof(&self) -> usize {
        self.points.len().saturating_sub(PARAM_COUNT)
    }
}

/// Full initial guess for a tube at `mask_pos`, built from the static seed.
pub fn initial_guess(seed: &SeedGuess, mask_pos: i64, tube: u32) -> FitParams {
    FitParams {
        base: seed.base,
        slope: seed.slope,
        max_val: seed.max_val,
        k0: seed.k0,
        x0: expected_x0(mask_pos),
        k1: seed.k1,
        x1: expected_x1(mask_pos, tube),
    }
}

/// Copy of `seed` with the sigmoid centers replaced by the geometric estimate.
pub fn positional_guess(seed: &FitParams, mask_pos: i64, tube: u32) -> FitParams {
    FitParams {
        x0: expected_x0(mask_pos),
        x1: expected_x1(mask_pos, tube),
        ..*seed
    }
}

/// Fit the scan file for `target` found under `data_dir`.
pub fn mask_fit(
    data_dir: &Path,
    target: FitTarget,
    seed: &FitParams,
    opts: &LmOptions,
) -> Result<FitOutcome, FitError> {
    let path = scan_path(data_dir, target.run, target.tube, target.mask_pos);
    let scan = load_scan(&path)?;
    fit_scan(&scan, target, seed, opts)
}

/// Fit an already loaded scan.
pub fn fit_scan(scan: &ScanData, target: FitTarget, seed: &FitParams, opts: &LmOptions) -> Result<FitOutcome, FitError> {
    let range = fit_range(target.mask_pos);
    let guess = positional_guess(seed, target.mask_pos, target.tube);

    let window = scan.window(range);
    let total = window.len();
    let points: Vec<ScanPoint> = window
        .into_iter()
        .filter(|p| p.counts.is_finite() && p.error.is_finite() && p.error > 0.0)
        .collect();
    if points.len() < total {
        log::debug!(
            "{}: dropped {} rows with non-positive or non-finite error",
            scan.path.display(),
            total - points.len()
        );
    }

    let problem = ScanProblem { points: &points };
    let report = levenberg_marquardt(&problem, DVector::from_row_slice(&guess.to_array()), opts)?;

    let mut fitted = [0.0; PARAM_COUNT];
    fitted.copy_from_slice(report.params.as_slice());
    let params = FitParams::from_array(fitted);
    if !params.is_finite() {
        return Err(FitError::NotConverged("non-finite parameters".to_string()));
    }

    let n = points.len();
    let covariance = if n > PARAM_COUNT {
        let reduced_chi2 = report.cost / (n - PARAM_COUNT) as f64;
        pseudo_inverse(&report.jtj).map(|inv| inv * reduced_chi2)
    } else {
        None
    };

    Ok(FitOutcome {
        target,
        range,
        points,
        guess,
        params,
        covariance,
        chi2: report.cost,
        evaluations: report.evaluations,
    })
}

/// Error-weighted residuals of the double-sigmoid model over a scan window.
struct ScanProblem<'a> {
    points: &'a [ScanPoint],
}

impl ScanProblem<'_> {
    fn params(v: &DVector<f64>) -> FitParams {
        FitParams::from_array([v[0], v[1], v[2], v[3], v[4], v[5], v[6]])
    }
}

impl LeastSquaresProblem for ScanProblem<'_> {
    fn residual_count(&self) -> usize {
        self.points.len()
    }

    fn residuals(&self, v: &DVector<f64>) -> DVector<f64> {
        let p = Self::params(v);
        DVector::from_iterator(
            self.points.len(),
            self.points
                .iter()
                .map(|pt| (pt.counts - fit_func(pt.pixel as f64, &p)) / pt.error),
        )
    }

    fn jacobian(&self, v: &DVector<f64>) -> DMatrix<f64> {
        let p = Self::params(v);
        let mut jac = DMatrix::<f64>::zeros(self.points.len(), PARAM_COUNT);
        for (i, pt) in self.points.iter().enumerate() {
            let grad = fit_func_gradient(pt.pixel as f64, &p);
            for (j, g) in grad.iter().enumerate() {
                jac[(i, j)] = -g / pt.error;
            }
        }
        jac
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::{SyntheticScan, synthesize_points};
    use std::path::PathBuf;

    fn truth() -> FitParams {
        FitParams {
            base: 816.0,
            slope: 0.0,
            max_val: -800.0,
            k0: 1.2,
            x0: 161.0,
            k1: 1.6,
            x1: 182.0,
        }
    }

    fn target(mask_pos: i64) -> FitTarget {
        FitTarget { tube: 0, mask_pos, run: 70454 }
    }

    #[test]
    fn positional_guess_ignores_seed_centers() {
        let seed = FitParams {
            x0: -5.0,
            x1: 9999.0,
            ..truth()
        };
        let g = positional_guess(&seed, 700, 10);
        assert!((g.x0 - 161.0).abs() < 1e-9);
        assert!((g.x1 - 171.6).abs() < 1e-9);
        assert_eq!(g.k0, seed.k0);
        assert_eq!(g.base, seed.base);
    }

    #[test]
    fn recovers_edges_from_noisy_scan() {
        let synth = SyntheticScan {
            params: truth(),
            noise: 1.0,
            seed: 7,
        };
        let scan = ScanData {
            path: PathBuf::from("synthetic"),
            points: synthesize_points(&synth),
        };
        let seed = initial_guess(&SeedGuess::default(), 700, 0);
        let fit = fit_scan(&scan, target(700), &seed, &LmOptions::default()).unwrap();

        assert!((fit.params.x0 - 161.0).abs() < 2.0, "x0={}", fit.params.x0);
        assert!((fit.params.x1 - 182.0).abs() < 2.0, "x1={}", fit.params.x1);
        assert_eq!(fit.range, FitRange { left: 143, right: 200 });
        assert_eq!(fit.points.len(), 57);
        let errs = fit.std_errors().expect("covariance");
        assert!(errs[4] < 1.0 && errs[6] < 1.0);
    }

    #[test]
    fn low_noise_scan_reports_expected_edge_and_width() {
        let synth = SyntheticScan {
            params: truth(),
            noise: 0.2,
            seed: 11,
        };
        let scan = ScanData {
            path: PathBuf::from("synthetic"),
            points: synthesize_points(&synth),
        };
        let seed = initial_guess(&SeedGuess::default(), 700, 0);
        let fit = fit_scan(&scan, target(700), &seed, &LmOptions::default()).unwrap();
        let (edge, width) = fit.estimate().formatted();
        assert_eq!(edge, "161.0");
        assert_eq!(width, "21.0");
    }

    #[test]
    fn rows_with_zero_error_are_excluded() {
        let mut points = synthesize_points(&SyntheticScan {
            params: truth(),
            noise: 0.0,
            seed: 1,
        });
        for p in points.iter_mut().filter(|p| p.pixel % 5 == 0) {
            p.error = 0.0;
        }
        let scan = ScanData {
            path: PathBuf::from("synthetic"),
            points,
        };
        let seed = initial_guess(&SeedGuess::default(), 700, 0);
        let fit = fit_scan(&scan, target(700), &seed, &LmOptions::default()).unwrap();
        assert!(fit.points.iter().all(|p| p.error > 0.0));
        assert!(fit.points.len() < 57);
    }

    #[test]
    fn empty_window_is_a_fit_failure() {
        let scan = ScanData {
            path: PathBuf::from("synthetic"),
            points: vec![ScanPoint {
                pixel: 3,
                counts: 10.0,
                error: 1.0,
            }],
        };
        let seed = initial_guess(&SeedGuess::default(), 700, 0);
        let err = fit_scan(&scan, target(700), &seed, &LmOptions::default()).unwrap_err();
        assert_eq!(err.kind(), crate::error::FailureKind::NotConverged);
    }

    #[test]
    fn missing_file_is_data_missing() {
        let dir = tempfile::tempdir().unwrap();
        let seed = initial_guess(&SeedGuess::default(), 700, 0);
        let err = mask_fit(dir.path(), target(700), &seed, &LmOptions::default()).unwrap_err();
        assert_eq!(err.kind(), crate::error::FailureKind::DataMissing);
    }
}
