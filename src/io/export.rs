//! Result writers.
//!
//! - `tube<N>_mask_fit.txt`: the per-tube edge/width table
//! - a combined CSV across all tubes, easy to consume in spreadsheets or
//!   downstream scripts

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::domain::{SweepSummary, TubeTable};
use crate::error::AppError;
use crate::report::format_tube_table;

pub fn table_file_name(tube: u32) -> String {
    format!("tube{tube}_mask_fit.txt")
}

/// Write (overwrite) the table for one tube into `dir`.
pub fn write_tube_table(dir: &Path, table: &TubeTable) -> Result<PathBuf, AppError> {
    let path = dir.join(table_file_name(table.tube));
    fs::write(&path, format_tube_table(table))
        .map_err(|e| AppError::new(2, format!("Failed to write tube table '{}': {e}", path.display())))?;
    Ok(path)
}

/// Write every fitted row of the sweep to a single CSV file.
pub fn write_results_csv(path: &Path, summary: &SweepSummary) -> Result<(), AppError> {
    let mut file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;

    writeln!(file, "tube,mask_pos,run,edge,width,x0,x1,x0_err,x1_err")
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    for table in summary.tubes.iter().filter_map(|r| r.table()) {
        for row in &table.rows {
            let (x0_err, x1_err) = row
                .std_errors
                .map(|e| (format!("{:.4}", e[4]), format!("{:.4}", e[6])))
                .unwrap_or_default();
            writeln!(
                file,
                "{},{},{},{:.4},{:.4},{:.4},{:.4},{},{}",
                table.tube,
                row.mask_pos,
                row.run,
                row.estimate.edge,
                row.estimate.width,
                row.params.x0,
                row.params.x1,
                x0_err,
                x1_err,
            )
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EdgeEstimate, FitParams, TubeReport, TubeRow, TubeStatus};

    fn row(mask_pos: i64, x0: f64, x1: f64) -> TubeRow {
        TubeRow {
            mask_pos,
            run: 70424 + (1000 - mask_pos) / 10,
            estimate: EdgeEstimate::from_centers(x0, x1),
            params: FitParams {
                base: 816.0,
                slope: 0.0,
                max_val: -800.0,
                k0: 1.2,
                x0,
                k1: 1.6,
                x1,
            },
            std_errors: None,
        }
    }

    #[test]
    fn tube_table_overwrites_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("tube4_mask_fit.txt");
        fs::write(&stale, "stale content that is much longer than the new table\n".repeat(10)).unwrap();

        let table = TubeTable {
            tube: 4,
            rows: vec![row(700, 161.04, 182.01)],
        };
        let path = write_tube_table(dir.path(), &table).unwrap();
        assert_eq!(path, stale);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "tube 4\nmask_pos mask_edge (pixel)    mask_width (pixels)\n700\t161.0\t21.0"
        );
    }

    #[test]
    fn csv_lists_rows_of_fitted_tubes_only() {
        let dir = tempfile::tempdir().unwrap();
        let summary = SweepSummary {
            tubes: vec![
                TubeReport {
                    tube: 0,
                    status: TubeStatus::Fitted {
                        seed: row(700, 161.0, 182.0).params,
                        table: TubeTable {
                            tube: 0,
                            rows: vec![row(1000, 230.0, 250.0), row(990, 227.7, 247.0)],
                        },
                        skipped: Vec::new(),
                        output: dir.path().join("tube0_mask_fit.txt"),
                    },
                },
                TubeReport {
                    tube: 1,
                    status: TubeStatus::Skipped {
                        kind: crate::error::FailureKind::DataMissing,
                        message: "missing".to_string(),
                    },
                },
            ],
        };
        let path = dir.path().join("all.csv");
        write_results_csv(&path, &summary).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("0,1000,70424,230.0000,20.0000,"));
        assert!(lines[2].ends_with(",,"));
    }
}
