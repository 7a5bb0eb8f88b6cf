//! Domain types used throughout the pipeline.
//!
//! - identifiers (`Camera`, `Night`, `ExposureId`)
//! - spectral products (`Frame`, `Fiberflat`, `SkyModel`)
//! - fiber classification (`ObjType`, `FiberLabels`)
//! - the sweep definition (`SweepPlan`, `ArtifactKey`)
//! - the residual statistics schema (`ResidualResults`)

pub mod plan;
pub mod results;
pub mod types;

pub use plan::*;
pub use results::*;
pub use types::*;
