//! Sweep driver shared by the `sweep` and `fit` commands.
//!
//! Per tube:
//! reference fit -> tube seed -> one fit per mask position -> table file
//!
//! Per-position failures become skipped rows; a failed reference fit skips
//! the whole tube. Only output I/O failures abort the run.

use std::fs;
use std::sync::Mutex;

use rayon::prelude::*;

use crate::domain::{
    FitParams, SeedPolicy, SkippedPosition, SweepConfig, SweepSummary, TubeReport, TubeRow, TubeStatus, TubeTable,
};
use crate::error::AppError;
use crate::fit::{FitOutcome, FitTarget, initial_guess, mask_fit};
use crate::io::write_tube_table;
use crate::math::LmOptions;
use crate::plot::{DiagnosticPlot, render_ascii_plot};

/// Receives fits selected by a `Diagnostics` predicate.
pub trait DiagnosticSink: Send + Sync {
    fn show(&self, fit: &FitOutcome) -> Result<(), AppError>;

    /// Takes over the terminal while showing a fit.
    fn is_interactive(&self) -> bool {
        false
    }
}

/// Prints an ASCII plot of the fit to stdout.
#[derive(Debug, Clone, Copy)]
pub struct AsciiSink {
    pub width: usize,
    pub height: usize,
    pub y_bounds: Option<[f64; 2]>,
}

impl DiagnosticSink for AsciiSink {
    fn show(&self, fit: &FitOutcome) -> Result<(), AppError> {
        let plot = DiagnosticPlot::from_fit(fit, self.y_bounds);
        println!("{}", render_ascii_plot(&plot, self.width, self.height));
        Ok(())
    }
}

/// Opens the interactive chart and waits for it to be dismissed.
#[derive(Debug, Clone, Copy)]
pub struct TuiSink {
    pub y_bounds: Option<[f64; 2]>,
}

impl DiagnosticSink for TuiSink {
    fn show(&self, fit: &FitOutcome) -> Result<(), AppError> {
        let plot = DiagnosticPlot::from_fit(fit, self.y_bounds);
        crate::tui::show_diagnostic(&plot)
    }

    fn is_interactive(&self) -> bool {
        true
    }
}

type FitPredicate = Box<dyn Fn(u32, i64) -> bool + Send + Sync>;

/// A predicate over `(tube, mask_pos)` plus the sink that receives matching fits.
pub struct Diagnostics {
    predicate: FitPredicate,
    sink: Box<dyn DiagnosticSink>,
    // One diagnostic at a time, even with parallel tubes.
    lock: Mutex<()>,
}

impl Diagnostics {
    pub fn new(predicate: impl Fn(u32, i64) -> bool + Send + Sync + 'static, sink: impl DiagnosticSink + 'static) -> Self {
        Self {
            predicate: Box::new(predicate),
            sink: Box::new(sink),
            lock: Mutex::new(()),
        }
    }

    /// Select fits by optional tube and mask position (`None` matches anything).
    pub fn at(tube: Option<u32>, mask_pos: Option<i64>, sink: impl DiagnosticSink + 'static) -> Self {
        Self::new(
            move |t, m| tube.is_none_or(|x| x == t) && mask_pos.is_none_or(|x| x == m),
            sink,
        )
    }

    pub fn is_interactive(&self) -> bool {
        self.sink.is_interactive()
    }

    fn observe(&self, fit: &FitOutcome) {
        if !(self.predicate)(fit.target.tube, fit.target.mask_pos) {
            return;
        }
        let _held = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(err) = self.sink.show(fit) {
            log::warn!(
                "diagnostic for tube {} mask {} failed: {err}",
                fit.target.tube,
                fit.target.mask_pos
            );
        }
    }
}

/// Reference fit plus one chosen position (for `maskfit fit`).
#[derive(Debug, Clone)]
pub struct PositionFit {
    pub reference: FitOutcome,
    pub seed: FitParams,
    pub fit: FitOutcome,
}

pub fn lm_options(config: &SweepConfig) -> LmOptions {
    LmOptions {
        max_evaluations: config.effective_max_evaluations(),
        ..LmOptions::default()
    }
}

fn reference_target(config: &SweepConfig, tube: u32) -> FitTarget {
    FitTarget {
        tube,
        mask_pos: config.reference_mask,
        run: config.run_for_mask(config.reference_mask),
    }
}

/// Seed for the sweep of `tube`, given its reference fit.
fn tube_seed(config: &SweepConfig, tube: u32, reference: &FitOutcome) -> FitParams {
    match config.seed_policy {
        SeedPolicy::Refined => reference.params,
        SeedPolicy::Static => initial_guess(&config.seed, config.reference_mask, tube),
    }
}

/// Run the reference fit and the sweep for one tube, then write its table.
pub fn run_tube(
    config: &SweepConfig,
    tube: u32,
    opts: &LmOptions,
    diagnostics: Option<&Diagnostics>,
) -> Result<TubeReport, AppError> {
    let data_dir = config.data_dir.as_path();
    let guess = initial_guess(&config.seed, config.reference_mask, tube);

    let reference = match mask_fit(data_dir, reference_target(config, tube), &guess, opts) {
        Ok(fit) => fit,
        Err(err) => {
            log::warn!("tube {tube}: reference fit at mask {} failed, skipping tube: {err}", config.reference_mask);
            return Ok(TubeReport {
                tube,
                status: TubeStatus::Skipped {
                    kind: err.kind(),
                    message: err.to_string(),
                },
            });
        }
    };
    if let Some(d) = diagnostics {
        d.observe(&reference);
    }

    let seed = tube_seed(config, tube, &reference);
    let mut table = TubeTable { tube, rows: Vec::new() };
    let mut skipped = Vec::new();

    for mask_pos in config.mask_positions() {
        let target = FitTarget {
            tube,
            mask_pos,
            run: config.run_for_mask(mask_pos),
        };
        match mask_fit(data_dir, target, &seed, opts) {
            Ok(fit) => {
                // The reference position was already shown with the reference fit.
                if mask_pos != config.reference_mask
                    && let Some(d) = diagnostics
                {
                    d.observe(&fit);
                }
                table.rows.push(TubeRow {
                    mask_pos,
                    run: target.run,
                    estimate: fit.estimate(),
                    params: fit.params,
                    std_errors: fit.std_errors(),
                });
            }
            Err(err) => {
                log::debug!("tube {tube} mask {mask_pos}: {} ({err})", err.kind().label());
                skipped.push(SkippedPosition {
                    mask_pos,
                    kind: err.kind(),
                    message: err.to_string(),
                });
            }
        }
    }

    let output = write_tube_table(config.output_dir(), &table)?;
    log::info!(
        "tube {tube}: {} rows, {} skipped -> {}",
        table.rows.len(),
        skipped.len(),
        output.display()
    );

    Ok(TubeReport {
        tube,
        status: TubeStatus::Fitted {
            seed,
            table,
            skipped,
            output,
        },
    })
}

/// Worker threads for a sweep. An interactive sink owns the terminal, so
/// other tubes must not log over it.
pub fn worker_count(config: &SweepConfig, diagnostics: Option<&Diagnostics>) -> usize {
    if config.jobs > 1 && diagnostics.is_some_and(Diagnostics::is_interactive) {
        log::warn!("interactive diagnostics selected; running tubes sequentially");
        return 1;
    }
    config.jobs
}

/// Process every tube of `config`, in tube order.
pub fn run_sweep(config: &SweepConfig, diagnostics: Option<&Diagnostics>) -> Result<SweepSummary, AppError> {
    config.validate()?;

    let out_dir = config.output_dir();
    fs::create_dir_all(out_dir)
        .map_err(|e| AppError::new(2, format!("Failed to create output directory '{}': {e}", out_dir.display())))?;

    let opts = lm_options(config);
    log::info!(
        "sweeping {} tubes over {} mask positions from {}",
        config.tube_count,
        config.mask_positions().len(),
        config.data_dir.display()
    );

    let jobs = worker_count(config, diagnostics);
    let tubes = if jobs > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .map_err(|e| AppError::new(4, format!("Failed to start worker pool: {e}")))?;
        pool.install(|| {
            (0..config.tube_count)
                .into_par_iter()
                .map(|tube| run_tube(config, tube, &opts, diagnostics))
                .collect::<Result<Vec<_>, _>>()
        })?
    } else {
        (0..config.tube_count)
            .map(|tube| run_tube(config, tube, &opts, diagnostics))
            .collect::<Result<Vec<_>, _>>()?
    };

    let summary = SweepSummary { tubes };
    let counts = summary.counts();
    log::info!(
        "sweep done: {} tubes fitted, {} skipped, {} rows",
        counts.tubes_fitted,
        counts.tubes_skipped,
        counts.rows
    );
    Ok(summary)
}

/// Reference fit for `tube`, then a single fit at `mask_pos` seeded per policy.
pub fn fit_position(
    config: &SweepConfig,
    tube: u32,
    mask_pos: i64,
    diagnostics: Option<&Diagnostics>,
) -> Result<PositionFit, AppError> {
    config.validate()?;
    let opts = lm_options(config);
    let guess = initial_guess(&config.seed, config.reference_mask, tube);

    let reference = mask_fit(&config.data_dir, reference_target(config, tube), &guess, &opts)?;
    let seed = tube_seed(config, tube, &reference);

    let target = FitTarget {
        tube,
        mask_pos,
        run: config.run_for_mask(mask_pos),
    };
    let fit = mask_fit(&config.data_dir, target, &seed, &opts)?;
    if let Some(d) = diagnostics {
        d.observe(&fit);
    }

    Ok(PositionFit { reference, seed, fit })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Arc;

    use crate::data::synthetic::{SimulationOptions, write_synthetic_sweep};
    use crate::error::FailureKind;
    use crate::io::{scan_path, table_file_name};

    fn small_config(dir: &Path) -> SweepConfig {
        SweepConfig {
            data_dir: dir.to_path_buf(),
            tube_count: 2,
            sweep_start: 720,
            sweep_stop: 680,
            ..SweepConfig::default()
        }
    }

    fn simulate(config: &SweepConfig) {
        let opts = SimulationOptions {
            tubes: config.tube_count,
            noise: 0.2,
            ..SimulationOptions::default()
        };
        write_synthetic_sweep(&config.data_dir, config, &opts).unwrap();
    }

    fn table_lines(dir: &Path, tube: u32) -> Vec<String> {
        fs::read_to_string(dir.join(table_file_name(tube)))
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[derive(Default)]
    struct Recorder {
        seen: Arc<Mutex<Vec<(u32, i64)>>>,
    }

    impl DiagnosticSink for Recorder {
        fn show(&self, fit: &FitOutcome) -> Result<(), AppError> {
            self.seen.lock().unwrap().push((fit.target.tube, fit.target.mask_pos));
            Ok(())
        }
    }

    #[test]
    fn end_to_end_rows_report_edge_and_width() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path());
        simulate(&config);

        let summary = run_sweep(&config, None).unwrap();
        assert_eq!(summary.counts().tubes_fitted, 2);
        assert_eq!(summary.counts().rows, 10);

        let lines = table_lines(dir.path(), 0);
        assert_eq!(lines[0], "tube 0");
        assert_eq!(lines[1], "mask_pos mask_edge (pixel)    mask_width (pixels)");
        assert_eq!(lines.len(), 2 + 5);

        let row_700: Vec<&str> = lines[4].split('\t').collect();
        assert_eq!(row_700[0], "700");
        let edge: f64 = row_700[1].parse().unwrap();
        let width: f64 = row_700[2].parse().unwrap();
        assert!((edge - 161.0).abs() < 0.5, "edge={edge}");
        assert!((width - 21.0).abs() < 0.5, "width={width}");

        // No trailing newline after the last row.
        let raw = fs::read_to_string(dir.path().join(table_file_name(0))).unwrap();
        assert!(raw.starts_with("tube 0\n") && raw.ends_with(|c: char| c.is_ascii_digit()));
    }

    #[test]
    fn missing_sweep_file_skips_only_that_row() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path());
        simulate(&config);
        fs::remove_file(scan_path(dir.path(), config.run_for_mask(710), 0, 710)).unwrap();

        let summary = run_sweep(&config, None).unwrap();
        let TubeStatus::Fitted { table, skipped, .. } = &summary.tubes[0].status else {
            panic!("tube 0 should be fitted");
        };
        let masks: Vec<i64> = table.rows.iter().map(|r| r.mask_pos).collect();
        assert_eq!(masks, vec![720, 700, 690, 680]);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].mask_pos, 710);
        assert_eq!(skipped[0].kind, FailureKind::DataMissing);
    }

    #[test]
    fn missing_reference_skips_tube_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path());
        simulate(&config);
        fs::remove_file(scan_path(dir.path(), config.run_for_mask(700), 0, 700)).unwrap();

        let summary = run_sweep(&config, None).unwrap();
        assert!(matches!(
            summary.tubes[0].status,
            TubeStatus::Skipped {
                kind: FailureKind::DataMissing,
                ..
            }
        ));
        assert!(!dir.path().join(table_file_name(0)).exists());
        assert!(dir.path().join(table_file_name(1)).exists());
        assert_eq!(summary.counts().tubes_skipped, 1);
    }

    #[test]
    fn empty_sweep_still_writes_header_table() {
        let dir = tempfile::tempdir().unwrap();
        let config = SweepConfig {
            tube_count: 1,
            ..small_config(dir.path())
        };
        simulate(&config);
        // Same reference run, but a sweep range with no scan files.
        let config = SweepConfig {
            sweep_start: 1000,
            sweep_stop: 990,
            ..config
        };
        run_sweep(&config, None).unwrap();
        assert_eq!(table_lines(dir.path(), 0).len(), 2);
    }

    #[test]
    fn reference_position_is_shown_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path());
        simulate(&config);

        let recorder = Recorder::default();
        let seen = Arc::clone(&recorder.seen);
        let diagnostics = Diagnostics::at(Some(1), Some(700), recorder);
        run_sweep(&config, Some(&diagnostics)).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![(1, 700)]);
    }

    #[test]
    fn predicate_sees_each_selected_sweep_position() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path());
        simulate(&config);

        let recorder = Recorder::default();
        let seen = Arc::clone(&recorder.seen);
        let diagnostics = Diagnostics::at(Some(0), None, recorder);
        run_sweep(&config, Some(&diagnostics)).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![(0, 700), (0, 720), (0, 710), (0, 690), (0, 680)]);
    }

    #[test]
    fn narrowed_sweep_reads_the_same_runs() {
        let dir = tempfile::tempdir().unwrap();
        let full = SweepConfig {
            data_dir: dir.path().to_path_buf(),
            tube_count: 1,
            ..SweepConfig::default()
        };
        simulate(&full);

        let narrow = SweepConfig {
            sweep_start: 800,
            sweep_stop: 600,
            ..full.clone()
        };
        assert_eq!(narrow.run_for_mask(700), full.run_for_mask(700));

        let summary = run_sweep(&narrow, None).unwrap();
        let TubeStatus::Fitted { table, .. } = &summary.tubes[0].status else {
            panic!("tube 0 should be fitted");
        };
        let row = table.rows.iter().find(|r| r.mask_pos == 700).unwrap();
        assert_eq!(row.run, 70454);
        assert!(table.rows.iter().all(|r| (600..=800).contains(&r.mask_pos)));
    }

    struct Interactive;

    impl DiagnosticSink for Interactive {
        fn show(&self, _fit: &FitOutcome) -> Result<(), AppError> {
            Ok(())
        }

        fn is_interactive(&self) -> bool {
            true
        }
    }

    #[test]
    fn interactive_diagnostics_force_sequential_tubes() {
        let config = SweepConfig {
            jobs: 4,
            ..SweepConfig::default()
        };
        let chart = Diagnostics::at(Some(10), Some(700), Interactive);
        let text = Diagnostics::at(Some(10), Some(700), Recorder::default());
        assert_eq!(worker_count(&config, Some(&chart)), 1);
        assert_eq!(worker_count(&config, Some(&text)), 4);
        assert_eq!(worker_count(&config, None), 4);
    }

    #[test]
    fn parallel_sweep_keeps_tube_order_and_results() {
        let dir = tempfile::tempdir().unwrap();
        let config = SweepConfig {
            tube_count: 3,
            ..small_config(dir.path())
        };
        simulate(&config);

        let sequential = run_sweep(&config, None).unwrap();
        let parallel = run_sweep(&SweepConfig { jobs: 3, ..config.clone() }, None).unwrap();

        let tubes: Vec<u32> = parallel.tubes.iter().map(|r| r.tube).collect();
        assert_eq!(tubes, vec![0, 1, 2]);
        for (a, b) in sequential.tubes.iter().zip(&parallel.tubes) {
            let (ta, tb) = (a.table().unwrap(), b.table().unwrap());
            assert_eq!(ta.rows.len(), tb.rows.len());
            for (ra, rb) in ta.rows.iter().zip(&tb.rows) {
                assert_eq!(ra.estimate.formatted(), rb.estimate.formatted());
            }
        }
    }

    #[test]
    fn static_policy_seeds_from_the_default_guess() {
        let dir = tempfile::tempdir().unwrap();
        let config = SweepConfig {
            tube_count: 1,
            seed_policy: SeedPolicy::Static,
            ..small_config(dir.path())
        };
        simulate(&config);

        let summary = run_sweep(&config, None).unwrap();
        let TubeStatus::Fitted { seed, table, .. } = &summary.tubes[0].status else {
            panic!("tube 0 should be fitted");
        };
        assert_eq!(*seed, initial_guess(&config.seed, 700, 0));
        assert_eq!(table.rows.len(), 5);
    }

    #[test]
    fn fit_position_reports_reference_and_target() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path());
        simulate(&config);

        let result = fit_position(&config, 1, 690, None).unwrap();
        assert_eq!(result.reference.target.mask_pos, 700);
        assert_eq!(result.fit.target.mask_pos, 690);
        assert_eq!(result.fit.target.run, config.run_for_mask(690));
        assert_eq!(result.seed, result.reference.params);
    }

    #[test]
    fn fit_position_missing_reference_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path());
        let err = fit_position(&config, 0, 690, None).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }
}
