//! Numerical helpers: percentiles, RMS and summary statistics.

pub mod stats;

pub use stats::*;
