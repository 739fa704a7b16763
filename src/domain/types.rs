//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON/CSV
//! - loaded from a JSON config file

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, FailureKind};

/// Number of free parameters in the double-sigmoid model.
pub const PARAM_COUNT: usize = 7;

/// Parameter labels, in vector order.
pub const PARAM_NAMES: [&str; PARAM_COUNT] = ["base", "slope", "max_val", "k0", "x0", "k1", "x1"];

/// The 7 parameters of the double-sigmoid edge model.
///
/// Vector order is `(base, slope, max_val, k0, x0, k1, x1)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitParams {
    pub base: f64,
    pub slope: f64,
    pub max_val: f64,
    pub k0: f64,
    pub x0: f64,
    pub k1: f64,
    pub x1: f64,
}

impl FitParams {
    pub fn to_array(self) -> [f64; PARAM_COUNT] {
        [self.base, self.slope, self.max_val, self.k0, self.x0, self.k1, self.x1]
    }

    pub fn from_array(p: [f64; PARAM_COUNT]) -> Self {
        Self {
            base: p[0],
            slope: p[1],
            max_val: p[2],
            k0: p[3],
            x0: p[4],
            k1: p[5],
            x1: p[6],
        }
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }

    /// Edge pixel and mask width implied by the two sigmoid centers.
    pub fn edge(&self) -> EdgeEstimate {
        EdgeEstimate::from_centers(self.x0, self.x1)
    }
}

/// Pixel window used as fit input. Half-open: `left <= pixel < right`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitRange {
    pub left: i64,
    pub right: i64,
}

impl FitRange {
    pub fn contains(&self, pixel: i64) -> bool {
        pixel >= self.left && pixel < self.right
    }

    pub fn len(&self) -> usize {
        (self.right - self.left).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One row of a scan file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanPoint {
    pub pixel: i64,
    pub counts: f64,
    pub error: f64,
}

/// A loaded scan for one (run, tube, mask position).
#[derive(Debug, Clone)]
pub struct ScanData {
    pub path: PathBuf,
    pub points: Vec<ScanPoint>,
}

impl ScanData {
    /// Rows whose pixel lies inside `range`, in file order.
    pub fn window(&self, range: FitRange) -> Vec<ScanPoint> {
        self.points
            .iter()
            .copied()
            .filter(|p| (0..=255).contains(&p.pixel) && range.contains(p.pixel))
            .collect()
    }
}

/// Fitted mask edge and width (pixels).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeEstimate {
    pub edge: f64,
    pub width: f64,
}

impl EdgeEstimate {
    pub fn from_centers(x0: f64, x1: f64) -> Self {
        Self {
            edge: x0.min(x1),
            width: (x1 - x0).abs(),
        }
    }

    /// `(edge, width)` each formatted to one decimal.
    pub fn formatted(&self) -> (String, String) {
        (format!("{:.1}", self.edge), format!("{:.1}", self.width))
    }
}

/// One successfully fitted mask position of a tube.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TubeRow {
    pub mask_pos: i64,
    pub run: i64,
    pub estimate: EdgeEstimate,
    pub params: FitParams,
    /// 1σ parameter uncertainties from the covariance diagonal (if available).
    pub std_errors: Option<[f64; PARAM_COUNT]>,
}

/// Accumulated result rows for one tube.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TubeTable {
    pub tube: u32,
    pub rows: Vec<TubeRow>,
}

/// A mask position that produced no row, and why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedPosition {
    pub mask_pos: i64,
    pub kind: FailureKind,
    pub message: String,
}

/// Outcome of processing one tube.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TubeStatus {
    /// The reference fit succeeded; the sweep ran and a table was written.
    Fitted {
        seed: FitParams,
        table: TubeTable,
        skipped: Vec<SkippedPosition>,
        output: PathBuf,
    },
    /// The reference fit failed; nothing was written for this tube.
    Skipped { kind: FailureKind, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TubeReport {
    pub tube: u32,
    #[serde(flatten)]
    pub status: TubeStatus,
}

impl TubeReport {
    pub fn table(&self) -> Option<&TubeTable> {
        match &self.status {
            TubeStatus::Fitted { table, .. } => Some(table),
            TubeStatus::Skipped { .. } => None,
        }
    }
}

/// Aggregate counts over a whole sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepCounts {
    pub tubes_fitted: usize,
    pub tubes_skipped: usize,
    pub rows: usize,
    pub positions_missing: usize,
    pub positions_failed: usize,
}

/// Everything a sweep produced.
#[derive(Debug, Clone, Default)]
pub struct SweepSummary {
    pub tubes: Vec<TubeReport>,
}

impl SweepSummary {
    pub fn counts(&self) -> SweepCounts {
        let mut counts = SweepCounts::default();
        for report in &self.tubes {
            match &report.status {
                TubeStatus::Fitted { table, skipped, .. } => {
                    counts.tubes_fitted += 1;
                    counts.rows += table.rows.len();
                    for s in skipped {
                        match s.kind {
                            FailureKind::DataMissing => counts.positions_missing += 1,
                            FailureKind::NotConverged => counts.positions_failed += 1,
                        }
                    }
                }
                TubeStatus::Skipped { .. } => counts.tubes_skipped += 1,
            }
        }
        counts
    }
}

/// Which parameter vector seeds the sweep of a tube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SeedPolicy {
    /// Seed every sweep fit with the refined reference-position parameters.
    Refined,
    /// Use the reference fit only as a gate; seed sweep fits with the static guess.
    Static,
}

/// Static initial guess for the non-positional parameters.
///
/// `x0`/`x1` are never taken from here; they are always derived from the mask
/// position and tube index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedGuess {
    pub base: f64,
    pub slope: f64,
    pub max_val: f64,
    pub k0: f64,
    pub k1: f64,
}

impl Default for SeedGuess {
    fn default() -> Self {
        Self {
            base: 816.0,
            slope: 0.0,
            max_val: -800.0,
            k0: 1.2,
            k1: 1.6,
        }
    }
}

/// A full sweep's configuration as understood by the pipeline.
///
/// Built from defaults, an optional JSON file, the environment and CLI flags
/// (in increasing precedence).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Directory holding the `run_*_tube*_mask*.txt` scan files.
    pub data_dir: PathBuf,
    /// Where `tube*_mask_fit.txt` tables go. Defaults to `data_dir`.
    pub output_dir: Option<PathBuf>,
    /// Run number recorded at `run_origin_mask`.
    pub run_start: i64,
    /// Mask position where the acquisition's run numbering starts.
    pub run_origin_mask: i64,
    /// Mask travel between consecutive acquisition runs.
    pub run_mask_step: i64,
    pub tube_count: u32,
    /// First (highest) mask position of the sweep.
    pub sweep_start: i64,
    /// Last (lowest) mask position, inclusive.
    pub sweep_stop: i64,
    pub sweep_step: i64,
    /// Mask position whose fit seeds each tube.
    pub reference_mask: i64,
    pub seed: SeedGuess,
    pub seed_policy: SeedPolicy,
    /// Model evaluation budget per fit (0 selects `200 * (PARAM_COUNT + 1)`).
    pub max_evaluations: usize,
    /// Worker threads for tube-level parallelism (1 = sequential).
    pub jobs: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("mask_data"),
            output_dir: None,
            run_start: 70424,
            run_origin_mask: 1000,
            run_mask_step: 10,
            tube_count: 192,
            sweep_start: 1000,
            sweep_stop: 0,
            sweep_step: 10,
            reference_mask: 700,
            seed: SeedGuess::default(),
            seed_policy: SeedPolicy::Refined,
            max_evaluations: 0,
            jobs: 1,
        }
    }
}

impl SweepConfig {
    pub fn output_dir(&self) -> &Path {
        self.output_dir.as_deref().unwrap_or(&self.data_dir)
    }

    /// Run identifier for a mask position (floor division, like the acquisition log).
    ///
    /// Independent of the sweep bounds: narrowing the sweep keeps the run numbers.
    pub fn run_for_mask(&self, mask_pos: i64) -> i64 {
        self.run_start + (self.run_origin_mask - mask_pos).div_euclid(self.run_mask_step)
    }

    /// Mask positions of the sweep, highest first, `sweep_stop` inclusive.
    pub fn mask_positions(&self) -> Vec<i64> {
        let mut out = Vec::new();
        let mut mask_pos = self.sweep_start;
        while mask_pos >= self.sweep_stop {
            out.push(mask_pos);
            mask_pos -= self.sweep_step;
        }
        out
    }

    pub fn effective_max_evaluations(&self) -> usize {
        if self.max_evaluations == 0 {
            200 * (PARAM_COUNT + 1)
        } else {
            self.max_evaluations
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.run_mask_step <= 0 {
            return Err(AppError::new(
                2,
                format!("Invalid run mask step {} (must be > 0).", self.run_mask_step),
            ));
        }
        if self.sweep_step <= 0 {
            return Err(AppError::new(2, format!("Invalid sweep step {} (must be > 0).", self.sweep_step)));
        }
        if self.sweep_start < self.sweep_stop {
            return Err(AppError::new(
                2,
                format!(
                    "Invalid sweep bounds: start={} < stop={} (the sweep runs downward).",
                    self.sweep_start, self.sweep_stop
                ),
            ));
        }
        if self.tube_count == 0 {
            return Err(AppError::new(2, "Tube count must be > 0."));
        }
        if self.jobs == 0 {
            return Err(AppError::new(2, "Jobs must be >= 1."));
        }
        let s = self.seed;
        if ![s.base, s.slope, s.max_val, s.k0, s.k1].iter().all(|v| v.is_finite()) {
            return Err(AppError::new(2, "Seed guess values must be finite."));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_and_width_from_ordered_centers() {
        let est = EdgeEstimate::from_centers(100.0, 150.0);
        assert_eq!(est.formatted(), ("100.0".to_string(), "50.0".to_string()));
    }

    #[test]
    fn edge_and_width_from_swapped_centers() {
        let est = EdgeEstimate::from_centers(150.0, 100.0);
        assert_eq!(est.formatted(), ("100.0".to_string(), "50.0".to_string()));
    }

    #[test]
    fn default_sweep_has_101_positions_ending_at_zero() {
        let cfg = SweepConfig::default();
        let positions = cfg.mask_positions();
        assert_eq!(positions.len(), 101);
        assert_eq!(positions[0], 1000);
        assert_eq!(*positions.last().unwrap(), 0);
    }

    #[test]
    fn run_numbers_follow_the_acquisition_order() {
        let cfg = SweepConfig::default();
        assert_eq!(cfg.run_for_mask(1000), 70424);
        assert_eq!(cfg.run_for_mask(700), 70454);
        assert_eq!(cfg.run_for_mask(0), 70524);
    }

    #[test]
    fn narrowing_the_sweep_keeps_run_numbers() {
        let narrow = SweepConfig {
            sweep_start: 800,
            sweep_stop: 600,
            sweep_step: 20,
            ..SweepConfig::default()
        };
        assert_eq!(narrow.run_for_mask(700), 70454);
        assert_eq!(narrow.run_for_mask(800), 70444);
        assert_eq!(narrow.mask_positions(), vec![800, 780, 760, 740, 720, 700, 680, 660, 640, 620, 600]);
    }

    #[test]
    fn validate_rejects_zero_run_step() {
        let cfg = SweepConfig {
            run_mask_step: 0,
            ..SweepConfig::default()
        };
        assert_eq!(cfg.validate().unwrap_err().exit_code(), 2);
    }

    #[test]
    fn output_dir_defaults_to_data_dir() {
        let mut cfg = SweepConfig::default();
        assert_eq!(cfg.output_dir(), Path::new("mask_data"));
        cfg.output_dir = Some(PathBuf::from("out"));
        assert_eq!(cfg.output_dir(), Path::new("out"));
    }

    #[test]
    fn validate_rejects_upward_sweep() {
        let cfg = SweepConfig {
            sweep_start: 0,
            sweep_stop: 100,
            ..SweepConfig::default()
        };
        assert_eq!(cfg.validate().unwrap_err().exit_code(), 2);
    }

    #[test]
    fn fit_range_is_half_open() {
        let r = FitRange { left: 11, right: 25 };
        assert!(r.contains(11));
        assert!(!r.contains(25));
        assert_eq!(r.len(), 14);
    }

    #[test]
    fn config_json_fills_missing_fields_with_defaults() {
        let cfg: SweepConfig = serde_json::from_str(r#"{ "tube_count": 4, "seed": { "k0": 2.0 } }"#).unwrap();
        assert_eq!(cfg.tube_count, 4);
        assert_eq!(cfg.run_start, 70424);
        assert_eq!(cfg.seed.k0, 2.0);
        assert_eq!(cfg.seed.base, 816.0);
    }
}
