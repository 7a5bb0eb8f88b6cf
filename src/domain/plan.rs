//! The sweep over (camera x repetition x sky-fiber count).

use crate::domain::{Camera, ExposureId, Night};
use crate::error::AppError;

/// Default sky-fiber counts swept when none are given.
pub const DEFAULT_NSKY_LIST: [usize; 11] = [1, 2, 5, 10, 20, 30, 40, 50, 60, 70, 80];

/// Default number of realizations per (camera, nsky).
pub const DEFAULT_REPS: usize = 5;

/// Identifies one generated artifact set (frame, sky, sframe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactKey {
    pub camera: Camera,
    pub expid: ExposureId,
    pub nsky: usize,
    pub rep: usize,
}

/// Validated sweep definition for one exposure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepPlan {
    night: Night,
    expid: ExposureId,
    cameras: Vec<Camera>,
    nsky_list: Vec<usize>,
    reps: usize,
}

impl SweepPlan {
    pub fn new(
        night: Night,
        expid: ExposureId,
        cameras: Vec<Camera>,
        nsky_list: Vec<usize>,
        reps: usize,
    ) -> Result<Self, AppError> {
        if cameras.is_empty() {
            return Err(AppError::usage("At least one camera is required."));
        }
        if nsky_list.is_empty() {
            return Err(AppError::usage("The sky-fiber count list is empty."));
        }
        if nsky_list.contains(&0) {
            return Err(AppError::usage("Sky-fiber counts must be >= 1."));
        }
        if reps == 0 {
            return Err(AppError::usage("Number of realizations must be >= 1."));
        }

        // Repeated entries would regenerate (and overwrite) the same files.
        let mut cams = Vec::with_capacity(cameras.len());
        for c in cameras {
            if !cams.contains(&c) {
                cams.push(c);
            }
        }
        let mut counts = Vec::with_capacity(nsky_list.len());
        for n in nsky_list {
            if !counts.contains(&n) {
                counts.push(n);
            }
        }

        Ok(Self {
            night,
            expid,
            cameras: cams,
            nsky_list: counts,
            reps,
        })
    }

    pub fn night(&self) -> Night {
        self.night
    }

    pub fn expid(&self) -> ExposureId {
        self.expid
    }

    pub fn cameras(&self) -> &[Camera] {
        &self.cameras
    }

    pub fn nsky_list(&self) -> &[usize] {
        &self.nsky_list
    }

    pub fn reps(&self) -> usize {
        self.reps
    }

    /// Keys for one camera, repetition-major then nsky, the generation order.
    pub fn keys_for(&self, camera: Camera) -> Vec<ArtifactKey> {
        let mut out = Vec::with_capacity(self.reps * self.nsky_list.len());
        for rep in 0..self.reps {
            for &nsky in &self.nsky_list {
                out.push(ArtifactKey {
                    camera,
                    expid: self.expid,
                    nsky,
                    rep,
                });
            }
        }
        out
    }

    /// Every key of the sweep, camera by camera.
    pub fn keys(&self) -> Vec<ArtifactKey> {
        self.cameras.iter().flat_map(|&c| self.keys_for(c)).collect()
    }
}
