//! Curve fitting for one (tube, mask position).
//!
//! Responsibilities:
//!
//! - derive the pixel window from the mask position
//! - build the positional initial guess (sigmoid centers from geometry)
//! - run the weighted Levenberg–Marquardt fit on one scan

pub mod fitter;
pub mod range;

pub use fitter::*;
pub use range::*;
