//! Residual statistics of subtracted frames.
//!
//! Each `sframe` contributes one `RealizationStats` (per TARGET fiber RMS and
//! integrated flux over the camera window). `aggregate` walks every expected
//! artifact of a plan; `summarize_camera` reduces one camera to per-nsky means
//! for plotting and the terminal table.

use std::path::Path;

use rayon::prelude::*;

use crate::domain::{
    ArtifactKey, CameraResults, Frame, ObjType, RealizationStats, RepResults, ResidualResults, SweepPlan, WaveWindow,
};
use crate::error::AppError;
use crate::io::{ArtifactKind, FrameStore, artifact_path, read_frame_if_present};
use crate::math::{mean, rms, std_dev};

pub mod format;

pub use format::*;

/// Statistics of one subtracted frame over `window`.
pub fn realization_stats(frame: &Frame, window: WaveWindow) -> Result<RealizationStats, AppError> {
    let pixels = window.indices(&frame.wave);
    if pixels.is_empty() {
        return Err(AppError::data(format!(
            "Wavelength window ({}, {}) selects no pixels of a {}-pixel frame.",
            window.min,
            window.max,
            frame.nwave()
        )));
    }

    let targets = frame.labels().indices(ObjType::Target);
    let per_fiber: Vec<(f64, f64)> = targets
        .par_iter()
        .map(|&i| {
            let values: Vec<f64> = pixels.iter().map(|&j| frame.flux[(i, j)]).collect();
            let fiber_rms = rms(&values).unwrap_or(0.0);
            (fiber_rms, values.iter().sum())
        })
        .collect();

    let (fiber_rms, integrated_flux) = per_fiber.into_iter().unzip();
    Ok(RealizationStats {
        fiber_rms,
        integrated_flux,
    })
}

/// Collect statistics for every `sframe` the plan expects under `basedir`.
///
/// Missing files are skipped. Every nsky of the plan is present in the result,
/// possibly with no realizations.
pub fn aggregate(store: &dyn FrameStore, basedir: &Path, plan: &SweepPlan) -> Result<ResidualResults, AppError> {
    let mut results = ResidualResults::default();

    for &camera in plan.cameras() {
        let window = camera.wave_window();
        let mut by_nsky = CameraResults::new();

        for &nsky in plan.nsky_list() {
            let mut reps = RepResults::new();
            for rep in 0..plan.reps() {
                let key = ArtifactKey {
                    camera,
                    expid: plan.expid(),
                    nsky,
                    rep,
                };
                let path = artifact_path(basedir, ArtifactKind::SFrame, &key);
                let Some(frame) = read_frame_if_present(store, &path)? else {
                    log::debug!("skipping missing {}", path.display());
                    continue;
                };
                let stats = realization_stats(&frame, window)
                    .map_err(|e| AppError::new(e.exit_code(), format!("{}: {}", path.display(), e.message())))?;
                reps.insert(rep, stats);
            }
            by_nsky.insert(nsky, reps);
        }

        results.cameras.insert(camera, by_nsky);
    }

    log::info!("collected {} realization(s)", results.realization_count());
    Ok(results)
}

/// Per-nsky reduction of one camera's results.
#[derive(Debug, Clone, PartialEq)]
pub struct NskySummary {
    pub nsky: usize,
    /// Mean fiber RMS of each realization, in repetition order.
    pub per_realization: Vec<f64>,
    pub mean: Option<f64>,
    /// Population standard deviation across realizations.
    pub std: Option<f64>,
}

pub fn summarize_camera(results: &CameraResults) -> Vec<NskySummary> {
    results
        .iter()
        .map(|(&nsky, reps)| {
            let per_realization: Vec<f64> = reps.values().filter_map(|r| mean(&r.fiber_rms)).collect();
            NskySummary {
                nsky,
                mean: mean(&per_realization),
                std: std_dev(&per_realization),
                per_realization,
            }
        })
        .collect()
}
