//! Text formatting for tables and terminal output.

use crate::domain::{PARAM_NAMES, SweepConfig, SweepSummary, TubeStatus, TubeTable};
use crate::fit::FitOutcome;

/// Column header line of a tube table.
pub const TABLE_HEADER: &str = "mask_pos mask_edge (pixel)    mask_width (pixels)";

/// Format a tube table exactly as written to `tube<N>_mask_fit.txt`.
///
/// No trailing newline: each row is introduced by a newline.
pub fn format_tube_table(table: &TubeTable) -> String {
    let mut out = format!("tube {}\n{TABLE_HEADER}", table.tube);
    for row in &table.rows {
        let (edge, width) = row.estimate.formatted();
        out.push_str(&format!("\n{}\t{edge}\t{width}", row.mask_pos));
    }
    out
}

/// Format the sweep summary (configuration, totals, one line per tube).
pub fn format_run_summary(summary: &SweepSummary, config: &SweepConfig) -> String {
    let mut out = String::new();

    out.push_str("=== maskfit - mask edge sweep ===\n");
    out.push_str(&format!("Data: {}\n", config.data_dir.display()));
    out.push_str(&format!("Output: {}\n", config.output_dir().display()));
    out.push_str(&format!(
        "Sweep: mask {}..{} step {} | reference mask {} | run {} at mask {} (step {})\n",
        config.sweep_start,
        config.sweep_stop,
        config.sweep_step,
        config.reference_mask,
        config.run_start,
        config.run_origin_mask,
        config.run_mask_step
    ));
    out.push_str(&format!("Seed policy: {:?}\n", config.seed_policy));

    let counts = summary.counts();
    out.push_str(&format!(
        "Tubes: fitted={} skipped={} | rows={} | positions missing={} failed={}\n",
        counts.tubes_fitted, counts.tubes_skipped, counts.rows, counts.positions_missing, counts.positions_failed
    ));

    out.push_str("\nPer tube:\n");
    for report in &summary.tubes {
        match &report.status {
            TubeStatus::Fitted { table, skipped, .. } => {
                let (lo, hi) = table
                    .rows
                    .iter()
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
                        (lo.min(r.estimate.edge), hi.max(r.estimate.edge))
                    });
                let range = if lo <= hi {
                    format!("edge=[{lo:.1}, {hi:.1}]")
                } else {
                    "edge=[-]".to_string()
                };
                out.push_str(&format!(
                    "  tube {:>3}  rows={:>3}  skipped={:>3}  {range}\n",
                    report.tube,
                    table.rows.len(),
                    skipped.len()
                ));
            }
            TubeStatus::Skipped { kind, message } => {
                out.push_str(&format!(
                    "  tube {:>3}  skipped ({}): {message}\n",
                    report.tube,
                    kind.label()
                ));
            }
        }
    }

    out
}

/// Format one fit with parameter uncertainties.
pub fn format_fit_detail(fit: &FitOutcome) -> String {
    let mut out = String::new();
    let t = fit.target;
    out.push_str(&format!(
        "Tube {} | mask {} | run {} | window [{}, {}) | n={} | chi2/dof={:.3} | evals={}\n",
        t.tube,
        t.mask_pos,
        t.run,
        fit.range.left,
        fit.range.right,
        fit.points.len(),
        fit.chi2 / fit.dof().max(1) as f64,
        fit.evaluations
    ));

    let errors = fit.std_errors();
    let guess = fit.guess.to_array();
    for (j, (name, value)) in PARAM_NAMES.iter().zip(fit.params.to_array()).enumerate() {
        let err = errors.map(|e| format!("± {:.4}", e[j])).unwrap_or_else(|| "± n/a".to_string());
        out.push_str(&format!("  {name:<8} {value:>12.4} {err:<14} (guess {:.4})\n", guess[j]));
    }

    let (edge, width) = fit.estimate().formatted();
    out.push_str(&format!("Edge: {edge} px | Width: {width} px\n"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EdgeEstimate, FitParams, TubeReport, TubeRow};
    use crate::error::FailureKind;

    fn params(x0: f64, x1: f64) -> FitParams {
        FitParams {
            base: 816.0,
            slope: 0.0,
            max_val: -800.0,
            k0: 1.2,
            x0,
            k1: 1.6,
            x1,
        }
    }

    fn row(mask_pos: i64, x0: f64, x1: f64) -> TubeRow {
        TubeRow {
            mask_pos,
            run: 0,
            estimate: EdgeEstimate::from_centers(x0, x1),
            params: params(x0, x1),
            std_errors: None,
        }
    }

    #[test]
    fn empty_table_is_header_only() {
        let table = TubeTable { tube: 12, rows: vec![] };
        assert_eq!(
            format_tube_table(&table),
            "tube 12\nmask_pos mask_edge (pixel)    mask_width (pixels)"
        );
    }

    #[test]
    fn table_rows_are_tab_separated_one_decimal() {
        let table = TubeTable {
            tube: 0,
            rows: vec![row(1000, 230.04, 250.0), row(990, 247.5, 227.66)],
        };
        assert_eq!(
            format_tube_table(&table),
            "tube 0\nmask_pos mask_edge (pixel)    mask_width (pixels)\n1000\t230.0\t20.0\n990\t227.7\t19.8"
        );
    }

    #[test]
    fn run_summary_lists_fitted_and_skipped_tubes() {
        let summary = SweepSummary {
            tubes: vec![
                TubeReport {
                    tube: 0,
                    status: TubeStatus::Fitted {
                        seed: params(161.0, 182.0),
                        table: TubeTable {
                            tube: 0,
                            rows: vec![row(700, 161.0, 182.0), row(690, 158.7, 179.7)],
                        },
                        skipped: vec![],
                        output: "tube0_mask_fit.txt".into(),
                    },
                },
                TubeReport {
                    tube: 1,
                    status: TubeStatus::Skipped {
                        kind: FailureKind::DataMissing,
                        message: "no reference scan".to_string(),
                    },
                },
            ],
        };
        let txt = format_run_summary(&summary, &SweepConfig::default());
        assert!(txt.contains("Tubes: fitted=1 skipped=1 | rows=2"));
        assert!(txt.contains("edge=[158.7, 161.0]"));
        assert!(txt.contains("tube   1  skipped (data missing): no reference scan"));
    }
}
