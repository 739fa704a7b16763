//! Error types.
//!
//! Two layers:
//! - `AppError`: fatal, process-level failures carrying an exit code.
//! - `FitError`: per-(tube, mask position) failures that the sweep driver
//!   handles explicitly (skip the row, or skip the whole tube).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        AppError::new(4, err.to_string())
    }
}

/// The two recognized ways a single fit can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Scan file absent or unreadable.
    DataMissing,
    /// The optimizer could not produce a converged solution.
    NotConverged,
}

impl FailureKind {
    pub fn label(self) -> &'static str {
        match self {
            FailureKind::DataMissing => "data missing",
            FailureKind::NotConverged => "fit failure",
        }
    }
}

/// Failure of a single (tube, mask position) fit.
#[derive(Debug, thiserror::Error)]
pub enum FitError {
    #[error("cannot read scan '{}': {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed scan '{}' line {line}: {message}", path.display())]
    Malformed {
        path: PathBuf,
        line: usize,
        message: String,
    },
    #[error("optimizer did not converge: {0}")]
    NotConverged(String),
    #[error("too few points in fit window: {points} points for {params} parameters")]
    TooFewPoints { points: usize, params: usize },
}

impl FitError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FitError::Unreadable { .. } | FitError::Malformed { .. } => FailureKind::DataMissing,
            FitError::NotConverged(_) | FitError::TooFewPoints { .. } => FailureKind::NotConverged,
        }
    }
}
