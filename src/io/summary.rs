//! JSON run summary.
//!
//! The summary is the "portable" record of a sweep:
//! - when it ran and with which configuration
//! - per tube: fitted (seed, rows with full parameter vectors, skipped
//!   positions) or skipped (reason)

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::domain::{SweepConfig, SweepSummary, TubeReport};
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryFile {
    pub tool: String,
    pub generated: DateTime<Local>,
    pub config: SweepConfig,
    pub tubes: Vec<TubeReport>,
}

/// Write a JSON summary file.
pub fn write_summary_json(path: &Path, summary: &SweepSummary, config: &SweepConfig) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create summary JSON '{}': {e}", path.display())))?;

    let doc = SummaryFile {
        tool: "maskfit".to_string(),
        generated: Local::now(),
        config: config.clone(),
        tubes: summary.tubes.clone(),
    };

    serde_json::to_writer_pretty(file, &doc)
        .map_err(|e| AppError::new(2, format!("Failed to write summary JSON: {e}")))?;

    Ok(())
}

/// Read a JSON summary file.
pub fn read_summary_json(path: &Path) -> Result<SummaryFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open summary JSON '{}': {e}", path.display())))?;
    let doc: SummaryFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid summary JSON: {e}")))?;
    Ok(doc)
}
