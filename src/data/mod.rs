//! Synthetic scan generation for demos and tests.

pub mod synthetic;

pub use synthetic::*;
