//! Double-sigmoid mask-edge model.
//!
//! The model is a pure function so that fitting, plotting and synthetic data
//! generation can share it.

pub mod model;

pub use model::*;
