//! Command-line parsing for the mask edge sweep.
//!
//! Argument parsing and command dispatch stay separate from the fitting code;
//! `crate::app` turns these structs into a `SweepConfig`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::domain::SeedPolicy;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "maskfit", version, about = "Mask edge and width from double-sigmoid fits of tube scans")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit every tube over the mask sweep and write `tube<N>_mask_fit.txt` tables.
    Sweep(SweepArgs),
    /// Fit one tube at one mask position and print the parameters.
    Fit(FitArgs),
    /// Write synthetic scan files for a sweep.
    Simulate(SimulateArgs),
    /// Print the summary of a previously exported sweep JSON.
    Report(ReportArgs),
}

/// Sweep configuration overrides, applied on top of `--config` and the environment.
#[derive(Debug, Args, Clone, Default)]
pub struct ConfigArgs {
    /// JSON file with `SweepConfig` fields (missing fields keep their defaults).
    #[arg(long, value_name = "JSON")]
    pub config: Option<PathBuf>,

    /// Directory holding the scan files.
    #[arg(short = 'd', long, env = "MASKFIT_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Directory for the tube tables (defaults to the data directory).
    #[arg(short = 'o', long, env = "MASKFIT_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Run number recorded at the run origin mask position.
    #[arg(long, env = "MASKFIT_RUN_START")]
    pub run_start: Option<i64>,

    /// Mask position where run numbering starts.
    #[arg(long, allow_negative_numbers = true)]
    pub run_origin_mask: Option<i64>,

    /// Mask travel between consecutive runs.
    #[arg(long)]
    pub run_mask_step: Option<i64>,

    /// Number of tubes.
    #[arg(long)]
    pub tubes: Option<u32>,

    /// First (highest) mask position.
    #[arg(long, allow_negative_numbers = true)]
    pub sweep_start: Option<i64>,

    /// Last (lowest) mask position, inclusive.
    #[arg(long, allow_negative_numbers = true)]
    pub sweep_stop: Option<i64>,

    /// Distance between mask positions.
    #[arg(long)]
    pub sweep_step: Option<i64>,

    /// Mask position of the per-tube reference fit.
    #[arg(long, allow_negative_numbers = true)]
    pub reference_mask: Option<i64>,

    /// Which parameters seed the sweep of a tube.
    #[arg(long, value_enum)]
    pub seed_policy: Option<SeedPolicy>,

    /// Model evaluation budget per fit (0 = 200 * (params + 1)).
    #[arg(long)]
    pub max_evaluations: Option<usize>,

    /// Initial guess: baseline counts.
    #[arg(long, allow_negative_numbers = true)]
    pub base: Option<f64>,

    /// Initial guess: baseline slope.
    #[arg(long, allow_negative_numbers = true)]
    pub slope: Option<f64>,

    /// Initial guess: shadow depth (negative for a dip).
    #[arg(long, allow_negative_numbers = true)]
    pub max_val: Option<f64>,

    /// Initial guess: steepness of the first edge.
    #[arg(long)]
    pub k0: Option<f64>,

    /// Initial guess: steepness of the second edge.
    #[arg(long)]
    pub k1: Option<f64>,
}

/// How selected fits are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlotMode {
    /// Interactive chart; blocks until dismissed and runs tubes sequentially.
    Tui,
    /// Text plot on stdout.
    Ascii,
}

/// Diagnostic plot options.
#[derive(Debug, Args, Clone)]
pub struct PlotArgs {
    #[arg(long, value_enum, default_value_t = PlotMode::Tui)]
    pub plot_mode: PlotMode,

    /// ASCII plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// ASCII plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Scale the counts axis to the data instead of clamping to [-10, 950].
    #[arg(long)]
    pub no_clamp: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct SweepArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Worker threads across tubes (1 = sequential).
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,

    /// Show diagnostics for this tube (with `--plot-mask`, a single fit).
    #[arg(long)]
    pub plot_tube: Option<u32>,

    /// Show diagnostics for this mask position.
    #[arg(long, allow_negative_numbers = true)]
    pub plot_mask: Option<i64>,

    #[command(flatten)]
    pub plot: PlotArgs,

    /// Export every fitted row to one CSV file.
    #[arg(long, value_name = "CSV")]
    pub export_csv: Option<PathBuf>,

    /// Export the sweep summary (config, per-tube status, full parameters) as JSON.
    #[arg(long, value_name = "JSON")]
    pub export_json: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Tube index.
    #[arg(short = 't', long)]
    pub tube: u32,

    /// Mask position.
    #[arg(short = 'm', long, allow_negative_numbers = true)]
    pub mask: i64,

    /// Plot the fit.
    #[arg(long)]
    pub plot: bool,

    #[command(flatten)]
    pub plot_opts: PlotArgs,
}

#[derive(Debug, Parser, Clone)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output directory for the scan files.
    #[arg(long, value_name = "DIR")]
    pub out: PathBuf,

    /// Noise multiplier (0 = exact model values).
    #[arg(long, default_value_t = 1.0)]
    pub noise: f64,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Shadow width of tube 0 (pixels).
    #[arg(long, default_value_t = 21.0)]
    pub shadow_width: f64,

    /// Probability of leaving a scan file out.
    #[arg(long, default_value_t = 0.0)]
    pub drop: f64,
}

#[derive(Debug, Parser, Clone)]
pub struct ReportArgs {
    /// Summary JSON written by `maskfit sweep --export-json`.
    #[arg(value_name = "JSON")]
    pub summary: PathBuf,
}
