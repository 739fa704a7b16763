//! `mask-edge` library crate.
//!
//! The binary (`maskfit`) is a thin wrapper around this library so that:
//!
//! - the sweep driver and fitter are testable without spawning processes
//! - scan I/O, the model and the optimizer are reusable on their own

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
pub mod tui;
