//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the model parameter vector (`FitParams`) and fit window (`FitRange`)
//! - scan observations (`ScanPoint`, `ScanData`)
//! - per-tube outputs (`TubeTable`, `TubeReport`, `SweepSummary`)
//! - sweep configuration (`SweepConfig`, `SeedGuess`, `SeedPolicy`)

pub mod types;

pub use types::*;
