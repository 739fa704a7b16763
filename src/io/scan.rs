//! Scan file naming and parsing.
//!
//! One file per (run, tube, mask position):
//!
//! ```text
//! run_<run>_tube<tube>_mask<mask_pos>.txt
//! ```
//!
//! Layout:
//! - two header lines (ignored)
//! - whitespace-delimited rows `pixel counts error`; extra columns are ignored
//! - blank lines and `#` comments are skipped
//!
//! Any problem reading or parsing the file is reported as a `DataMissing`
//! class error so the driver can skip the position.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{ScanData, ScanPoint};
use crate::error::FitError;

/// Number of header lines preceding the data rows.
pub const HEADER_LINES: usize = 2;

pub fn scan_file_name(run: i64, tube: u32, mask_pos: i64) -> String {
    format!("run_{run}_tube{tube}_mask{mask_pos}.txt")
}

pub fn scan_path(data_dir: &Path, run: i64, tube: u32, mask_pos: i64) -> PathBuf {
    data_dir.join(scan_file_name(run, tube, mask_pos))
}

/// Read and parse a scan file.
pub fn load_scan(path: &Path) -> Result<ScanData, FitError> {
    let text = fs::read_to_string(path).map_err(|source| FitError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    parse_scan(&text, path)
}

/// Parse scan text. `path` is only used for error messages.
pub fn parse_scan(text: &str, path: &Path) -> Result<ScanData, FitError> {
    let malformed = |line: usize, message: String| FitError::Malformed {
        path: path.to_path_buf(),
        line,
        message,
    };

    let mut points = Vec::new();
    for (idx, raw) in text.lines().enumerate().skip(HEADER_LINES) {
        let line = idx + 1;
        let content = raw.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }

        let mut cols = content.split_whitespace();
        let (Some(pixel), Some(counts), Some(error)) = (cols.next(), cols.next(), cols.next()) else {
            return Err(malformed(line, format!("expected 3 columns, got '{content}'")));
        };

        let pixel: i64 = pixel
            .parse()
            .map_err(|_| malformed(line, format!("invalid pixel index '{pixel}'")))?;
        let counts: f64 = counts
            .parse()
            .map_err(|_| malformed(line, format!("invalid counts '{counts}'")))?;
        let error: f64 = error
            .parse()
            .map_err(|_| malformed(line, format!("invalid error '{error}'")))?;

        points.push(ScanPoint { pixel, counts, error });
    }

    Ok(ScanData {
        path: path.to_path_buf(),
        points,
    })
}

/// Render points in the scan file layout (used by the synthetic generator).
pub fn format_scan(header: &str, points: &[ScanPoint]) -> String {
    let mut out = String::new();
    out.push_str(header.lines().next().unwrap_or(""));
    out.push('\n');
    out.push_str("pixel counts error\n");
    for p in points {
        out.push_str(&format!("{} {:.6} {:.6}\n", p.pixel, p.counts, p.error));
    }
    out
}
