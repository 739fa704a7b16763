//! Top-level application orchestration.
//!
//! `src/main.rs` is tiny; this module is the "real main" that:
//! - sets up logging and loads `.env`
//! - parses CLI arguments and builds the sweep configuration
//! - runs the sweep / single fit / simulation
//! - prints reports and writes optional exports

use std::fs;
use std::path::Path;

use clap::Parser;

use crate::cli::{Command, ConfigArgs, FitArgs, PlotArgs, PlotMode, ReportArgs, SimulateArgs, SweepArgs};
use crate::data::{SimulationOptions, write_synthetic_sweep};
use crate::domain::{SweepConfig, SweepSummary};
use crate::error::AppError;
use crate::plot::DEFAULT_Y_BOUNDS;

pub mod pipeline;

use pipeline::{AsciiSink, Diagnostics, TuiSink};

/// Entry point for the `maskfit` binary.
pub fn run() -> Result<(), AppError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    // Optional; env vars feed the clap `env` fallbacks.
    dotenvy::dotenv().ok();

    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Sweep(args) => handle_sweep(args),
        Command::Fit(args) => handle_fit(args),
        Command::Simulate(args) => handle_simulate(args),
        Command::Report(args) => handle_report(args),
    }
}

fn handle_sweep(args: SweepArgs) -> Result<(), AppError> {
    let mut config = sweep_config_from_args(&args.config)?;
    if let Some(jobs) = args.jobs {
        config.jobs = jobs;
    }
    config.validate()?;

    let diagnostics = if args.plot_tube.is_some() || args.plot_mask.is_some() {
        Some(diagnostics_for(args.plot_tube, args.plot_mask, &args.plot))
    } else {
        None
    };

    let summary = pipeline::run_sweep(&config, diagnostics.as_ref())?;
    println!("{}", crate::report::format_run_summary(&summary, &config));

    if let Some(path) = &args.export_csv {
        crate::io::write_results_csv(path, &summary)?;
        log::info!("wrote {}", path.display());
    }
    if let Some(path) = &args.export_json {
        crate::io::write_summary_json(path, &summary, &config)?;
        log::info!("wrote {}", path.display());
    }
    Ok(())
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = sweep_config_from_args(&args.config)?;

    let diagnostics = args
        .plot
        .then(|| diagnostics_for(Some(args.tube), Some(args.mask), &args.plot_opts));

    let result = pipeline::fit_position(&config, args.tube, args.mask, diagnostics.as_ref())?;
    let reference = result.reference.estimate();
    println!(
        "Reference mask {}: edge={:.1} width={:.1} (seed policy {:?})",
        config.reference_mask, reference.edge, reference.width, config.seed_policy
    );
    println!("{}", crate::report::format_fit_detail(&result.fit));
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let config = sweep_config_from_args(&args.config)?;
    config.validate()?;

    let opts = SimulationOptions {
        tubes: config.tube_count,
        noise: args.noise,
        seed: args.seed,
        width: args.shadow_width,
        drop_probability: args.drop,
        ..SimulationOptions::default()
    };
    let written = write_synthetic_sweep(&args.out, &config, &opts)?;
    println!("Wrote {written} scan files to {}", args.out.display());
    Ok(())
}

fn handle_report(args: ReportArgs) -> Result<(), AppError> {
    let doc = crate::io::read_summary_json(&args.summary)?;
    println!("Generated: {} by {}", doc.generated.format("%Y-%m-%d %H:%M:%S"), doc.tool);
    let summary = SweepSummary { tubes: doc.tubes };
    println!("{}", crate::report::format_run_summary(&summary, &doc.config));
    Ok(())
}

fn diagnostics_for(tube: Option<u32>, mask_pos: Option<i64>, plot: &PlotArgs) -> Diagnostics {
    let y_bounds = (!plot.no_clamp).then_some(DEFAULT_Y_BOUNDS);
    match plot.plot_mode {
        PlotMode::Ascii => Diagnostics::at(
            tube,
            mask_pos,
            AsciiSink {
                width: plot.width,
                height: plot.height,
                y_bounds,
            },
        ),
        PlotMode::Tui => Diagnostics::at(tube, mask_pos, TuiSink { y_bounds }),
    }
}

/// Defaults -> `--config` JSON -> environment / CLI flags.
///
/// Clap resolves each flag from the command line first and its `env` variable
/// second, so a single overlay covers both.
pub fn sweep_config_from_args(args: &ConfigArgs) -> Result<SweepConfig, AppError> {
    let mut config = match &args.config {
        Some(path) => load_config_file(path)?,
        None => SweepConfig::default(),
    };

    if let Some(v) = &args.data_dir {
        config.data_dir = v.clone();
    }
    if let Some(v) = &args.output_dir {
        config.output_dir = Some(v.clone());
    }
    if let Some(v) = args.run_start {
        config.run_start = v;
    }
    if let Some(v) = args.run_origin_mask {
        config.run_origin_mask = v;
    }
    if let Some(v) = args.run_mask_step {
        config.run_mask_step = v;
    }
    if let Some(v) = args.tubes {
        config.tube_count = v;
    }
    if let Some(v) = args.sweep_start {
        config.sweep_start = v;
    }
    if let Some(v) = args.sweep_stop {
        config.sweep_stop = v;
    }
    if let Some(v) = args.sweep_step {
        config.sweep_step = v;
    }
    if let Some(v) = args.reference_mask {
        config.reference_mask = v;
    }
    if let Some(v) = args.seed_policy {
        config.seed_policy = v;
    }
    if let Some(v) = args.max_evaluations {
        config.max_evaluations = v;
    }
    if let Some(v) = args.base {
        config.seed.base = v;
    }
    if let Some(v) = args.slope {
        config.seed.slope = v;
    }
    if let Some(v) = args.max_val {
        config.seed.max_val = v;
    }
    if let Some(v) = args.k0 {
        config.seed.k0 = v;
    }
    if let Some(v) = args.k1 {
        config.seed.k1 = v;
    }

    Ok(config)
}

fn load_config_file(path: &Path) -> Result<SweepConfig, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::new(2, format!("Failed to read config '{}': {e}", path.display())))?;
    serde_json::from_str(&text).map_err(|e| AppError::new(2, format!("Invalid config '{}': {e}", path.display())))
}

/// Rewrite argv so `maskfit` defaults to `maskfit sweep`.
///
/// Rules:
/// - `maskfit`                         -> `maskfit sweep`
/// - `maskfit --tubes 4 ...`           -> `maskfit sweep --tubes 4 ...`
/// - `maskfit --help/--version/-h`     -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("sweep".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help");
    if is_top_level_help_or_version {
        return argv;
    }

    if arg1.starts_with('-') {
        argv.insert(1, "sweep".to_string());
    }
    argv
}
