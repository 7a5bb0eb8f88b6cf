//! Data sources that do not come from the reduction tree.

pub mod synthetic;

pub use synthetic::{SyntheticExposure, SyntheticProducts, mean_sky_model};
