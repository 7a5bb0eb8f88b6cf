//! Sky subtraction of generated frames.

use std::path::PathBuf;

use crate::domain::{ArtifactKey, SweepPlan};
use crate::error::AppError;
use crate::io::{ArtifactKind, artifact_path};
use crate::pipeline::SweepContext;

/// Write `sframe-…` for every key in `succeeded`.
///
/// The sframe is the generated frame file with its flux and ivar replaced.
///
/// Keys of the plan that are not in `succeeded` had no sky model; they are skipped
/// with a warning. The fiberflat is read once per camera.
pub fn subtract_sky_models(
    ctx: &SweepContext<'_>,
    plan: &SweepPlan,
    succeeded: &[ArtifactKey],
) -> Result<Vec<PathBuf>, AppError> {
    let mut written = Vec::new();

    for &camera in plan.cameras() {
        let keys: Vec<ArtifactKey> = plan.keys_for(camera);
        if !keys.iter().any(|k| succeeded.contains(k)) {
            log::warn!("no sky models for {camera}; nothing to subtract");
            continue;
        }
        let fiberflat = ctx.load_fiberflat(plan.night(), plan.expid(), camera)?;

        for key in keys {
            if !succeeded.contains(&key) {
                log::warn!("skipping {camera} nsky={} rep={}: no sky model", key.nsky, key.rep);
                continue;
            }
            let frame_path = artifact_path(ctx.basedir, ArtifactKind::Frame, &key);
            let frame = ctx.store.read_frame(&frame_path)?;
            let sky = ctx.store.read_sky(&artifact_path(ctx.basedir, ArtifactKind::Sky, &key))?;

            let flat = ctx.calibrator.apply_fiberflat(&frame, &fiberflat)?;
            let sframe = ctx.calibrator.subtract_sky(&flat, &sky)?;

            let path = artifact_path(ctx.basedir, ArtifactKind::SFrame, &key);
            ctx.store.write_subtracted_frame(&frame_path, &path, &sframe)?;
            log::info!("wrote {}", path.display());
            written.push(path);
        }
    }

    Ok(written)
}
