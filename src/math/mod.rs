//! Numerical building blocks: stable sigmoid, SVD least squares, and the
//! Levenberg–Marquardt driver built on top of them.

pub mod lm;
pub mod ols;
pub mod sigmoid;

pub use lm::*;
pub use ols::*;
pub use sigmoid::*;
