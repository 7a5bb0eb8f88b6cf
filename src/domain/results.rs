//! Residual statistics schema.
//!
//! Serialized as `{camera: {nsky: {rep: {"fiber_RMS": [...], "integrated_flux": [...]}}}}`.
//! Integer keys become JSON strings and are parsed back on read.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::Camera;

/// Residual statistics of one subtracted frame, one entry per TARGET fiber.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RealizationStats {
    #[serde(rename = "fiber_RMS")]
    pub fiber_rms: Vec<f64>,
    pub integrated_flux: Vec<f64>,
}

/// Realizations keyed by repetition index.
pub type RepResults = BTreeMap<usize, RealizationStats>;

/// Per-camera results keyed by sky-fiber count.
pub type CameraResults = BTreeMap<usize, RepResults>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResidualResults {
    pub cameras: BTreeMap<Camera, CameraResults>,
}

impl ResidualResults {
    pub fn camera(&self, camera: Camera) -> Option<&CameraResults> {
        self.cameras.get(&camera)
    }

    /// Number of realizations stored across all cameras.
    pub fn realization_count(&self) -> usize {
        self.cameras
            .values()
            .flat_map(|by_nsky| by_nsky.values())
            .map(|reps| reps.len())
            .sum()
    }
}
