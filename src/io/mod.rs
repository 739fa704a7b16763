//! Input/output helpers.
//!
//! - scan file naming + parsing (`scan`)
//! - per-tube result tables and combined CSV (`export`)
//! - JSON run summary (`summary`)

pub mod export;
pub mod scan;
pub mod summary;

pub use export::*;
pub use scan::*;
pub use summary::*;
