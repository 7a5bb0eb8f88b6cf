//! Batch generation of relabelled frames.

use std::path::PathBuf;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::domain::{ArtifactKey, ObjType, SweepPlan};
use crate::error::AppError;
use crate::io::{ArtifactKind, artifact_path};
use crate::pipeline::{SweepContext, realization_seed};
use crate::select::select_sky_fibers;

/// One relabelled frame written to the base directory.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedFrame {
    pub key: ArtifactKey,
    pub path: PathBuf,
    pub eligible: usize,
    pub bad: usize,
}

/// Write `frame-{cam}-{expid}-{nsky}-{rep}.fits` for every key of the plan.
///
/// Each file is a copy of the redux frame with only its fibermap object types
/// replaced, so the sky tool sees the full product.
///
/// Inputs are read once per camera. Each realization draws its sky fibers from an
/// RNG seeded by `realization_seed(seed, key)`, so reruns reproduce the same files.
pub fn generate_frames(ctx: &SweepContext<'_>, plan: &SweepPlan, seed: u64) -> Result<Vec<GeneratedFrame>, AppError> {
    let mut out = Vec::with_capacity(plan.keys().len());

    for &camera in plan.cameras() {
        let inputs = ctx.load_camera_inputs(plan.night(), plan.expid(), camera)?;

        for key in plan.keys_for(camera) {
            let mut rng = StdRng::seed_from_u64(realization_seed(seed, &key));
            let selection = select_sky_fibers(&inputs.frame, &inputs.fiberflat, ctx.calibrator, key.nsky, &mut rng)
                .map_err(|e| {
                    AppError::new(
                        e.exit_code(),
                        format!("{camera} nsky={} rep={}: {}", key.nsky, key.rep, e.message()),
                    )
                })?;
            let path = artifact_path(ctx.basedir, ArtifactKind::Frame, &key);
            ctx.store
                .write_relabelled_frame(&inputs.frame_path, &path, &selection.labels)?;
            log::info!(
                "wrote {} (sky={}, eligible={}, flux band=({:.1}, {:.1}))",
                path.display(),
                key.nsky,
                selection.eligible,
                selection.flux_band.0,
                selection.flux_band.1
            );

            out.push(GeneratedFrame {
                key,
                path,
                eligible: selection.eligible,
                bad: selection.labels.count(ObjType::Bad),
            });
        }
    }

    Ok(out)
}
