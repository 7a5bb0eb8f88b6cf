//! Input/output helpers.
//!
//! - storage seam for spectral products (`store`), with FITS (`fits`, feature
//!   `fits`) and in-memory (`memory`) implementations
//! - reduction-tree layout and calibration lookup (`layout`)
//! - artifact and report file names (`naming`)
//! - residual statistics JSON read/write (`results`)

#[cfg(feature = "fits")]
pub mod fits;
pub mod layout;
pub mod memory;
pub mod naming;
pub mod results;
pub mod store;

pub use layout::*;
pub use memory::*;
pub use naming::*;
pub use results::*;
pub use store::*;
