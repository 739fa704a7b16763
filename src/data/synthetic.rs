//! Synthetic mask scans drawn from the double-sigmoid model.
//!
//! Counts follow the model plus Gaussian noise with a Poisson-like scale
//! (`σ = sqrt(expected)`), and the error column carries that same `σ`, so the
//! files look like what the acquisition system writes.

use std::fs;
use std::path::Path;

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{FitParams, ScanPoint, SweepConfig};
use crate::error::AppError;
use crate::fit::range::expected_x0;
use crate::io::scan::{format_scan, scan_path};
use crate::models::fit_func;

/// Highest pixel index of a tube.
pub const PIXEL_MAX: i64 = 255;

/// One synthetic scan.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticScan {
    pub params: FitParams,
    /// Multiplier on the Poisson-like noise (0 = exact model values).
    pub noise: f64,
    pub seed: u64,
}

/// Settings for writing a whole synthetic sweep.
#[derive(Debug, Clone)]
pub struct SimulationOptions {
    pub tubes: u32,
    pub noise: f64,
    pub seed: u64,
    /// Shadow width at tube 0 (pixels).
    pub width: f64,
    /// Extra shadow width per tube index (pixels).
    pub width_per_tube: f64,
    pub base: f64,
    pub max_val: f64,
    pub k0: f64,
    pub k1: f64,
    /// Probability of leaving a scan file out (simulates missing runs).
    pub drop_probability: f64,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            tubes: 4,
            noise: 1.0,
            seed: 42,
            width: 21.0,
            width_per_tube: 0.06,
            base: 816.0,
            max_val: -800.0,
            k0: 1.2,
            k1: 1.6,
            drop_probability: 0.0,
        }
    }
}

impl SimulationOptions {
    /// True model parameters for a (tube, mask position).
    pub fn truth(&self, tube: u32, mask_pos: i64) -> FitParams {
        let x0 = expected_x0(mask_pos);
        FitParams {
            base: self.base,
            slope: 0.0,
            max_val: self.max_val,
            k0: self.k0,
            x0,
            k1: self.k1,
            x1: x0 + self.width + self.width_per_tube * tube as f64,
        }
    }
}

/// Generate rows for pixels `0..=255`.
pub fn synthesize_points(synth: &SyntheticScan) -> Vec<ScanPoint> {
    let mut rng = StdRng::seed_from_u64(synth.seed);
    let normal = Normal::new(0.0, 1.0).ok();

    (0..=PIXEL_MAX)
        .map(|pixel| {
            let expected = fit_func(pixel as f64, &synth.params).max(0.0);
            let sigma = expected.max(1.0).sqrt();
            let z = match &normal {
                Some(n) if synth.noise > 0.0 => n.sample(&mut rng),
                _ => 0.0,
            };
            ScanPoint {
                pixel,
                counts: (expected + synth.noise * sigma * z).max(0.0),
                error: sigma,
            }
        })
        .collect()
}

/// Write scan files for every tube and mask position of `config`'s sweep
/// (plus the reference position). Returns the number of files written.
pub fn write_synthetic_sweep(dir: &Path, config: &SweepConfig, opts: &SimulationOptions) -> Result<usize, AppError> {
    if !(0.0..1.0).contains(&opts.drop_probability) {
        return Err(AppError::new(2, "Drop probability must be in [0, 1)."));
    }
    fs::create_dir_all(dir)
        .map_err(|e| AppError::new(2, format!("Failed to create '{}': {e}", dir.display())))?;

    let mut positions = config.mask_positions();
    if !positions.contains(&config.reference_mask) {
        positions.push(config.reference_mask);
    }

    let mut drop_rng = StdRng::seed_from_u64(opts.seed);
    let mut written = 0usize;

    for tube in 0..opts.tubes {
        for &mask_pos in &positions {
            if opts.drop_probability > 0.0 && drop_rng.gen_bool(opts.drop_probability) {
                continue;
            }
            let run = config.run_for_mask(mask_pos);
            let synth = SyntheticScan {
                params: opts.truth(tube, mask_pos),
                noise: opts.noise,
                seed: file_seed(opts.seed, tube, mask_pos),
            };
            let path = scan_path(dir, run, tube, mask_pos);
            let header = format!("synthetic run {run} tube {tube} mask {mask_pos}");
            fs::write(&path, format_scan(&header, &synthesize_points(&synth)))
                .map_err(|e| AppError::new(2, format!("Failed to write '{}': {e}", path.display())))?;
            written += 1;
        }
    }

    log::info!("wrote {written} synthetic scans to {}", dir.display());
    Ok(written)
}

/// Per-file RNG seed; fixed arithmetic so a seed reproduces the same files
/// on every toolchain.
fn file_seed(seed: u64, tube: u32, mask_pos: i64) -> u64 {
    let h = splitmix64(seed);
    let h = splitmix64(h ^ u64::from(tube));
    splitmix64(h ^ mask_pos as u64)
}

fn splitmix64(z: u64) -> u64 {
    let z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    let z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
