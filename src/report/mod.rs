//! Reporting utilities: the per-tube table text and terminal summaries.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - the on-disk table layout is defined exactly once

pub mod format;

pub use format::*;
