//! Shared sweep workflow used by every subcommand.
//!
//! generate frames -> sky models -> subtraction -> JSON statistics -> HTML plots
//!
//! Each step takes its collaborators explicitly so the whole chain runs against
//! an in-memory store and a fake sky tool in tests.

use std::path::{Path, PathBuf};

use crate::domain::{ArtifactKey, Night, ResidualResults, SweepPlan};
use crate::error::AppError;
use crate::io::{
    ArtifactKind, FrameStore, artifact_path, camera_plots_file_name, read_results_json, results_file_name,
    sky_plots_file_name, write_results_json,
};
use crate::pipeline::{
    GeneratedFrame, SkyModelRunner, SweepContext, SweepReport, compute_sky_models, generate_frames,
    subtract_sky_models,
};

/// Everything a sweep needs beyond its collaborators.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub plan: SweepPlan,
    /// Generated frame, sky and sframe files.
    pub basedir: PathBuf,
    pub seed: u64,
    pub sky_command: String,
}

/// Outputs of the generate / sky / subtract steps.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub generated: Vec<GeneratedFrame>,
    pub sky: SweepReport,
    pub sframes: Vec<PathBuf>,
}

pub fn run_analysis(
    ctx: &SweepContext<'_>,
    plan: &SweepPlan,
    seed: u64,
    runner: &dyn SkyModelRunner,
) -> Result<RunOutput, AppError> {
    // 1) Relabelled frames.
    let generated = generate_frames(ctx, plan, seed)?;

    // 2) Sky models; failures are reported and skipped.
    let sky = compute_sky_models(ctx, plan, runner)?;

    // 3) Subtraction of every realization that has a sky model.
    let sframes = subtract_sky_models(ctx, plan, &sky.succeeded())?;

    Ok(RunOutput {
        generated,
        sky,
        sframes,
    })
}

/// Aggregate the sframes under `basedir` and write `data-{night}-{expid}.json` to `jsondir`.
pub fn write_results(
    store: &dyn FrameStore,
    basedir: &Path,
    plan: &SweepPlan,
    jsondir: &Path,
) -> Result<(PathBuf, ResidualResults), AppError> {
    let results = crate::report::aggregate(store, basedir, plan)?;
    let path = jsondir.join(results_file_name(plan.night(), plan.expid()));
    write_results_json(&path, &results)?;
    log::info!("wrote {}", path.display());
    Ok((path, results))
}

/// Read the JSON statistics, from `file` when given, else from `jsondir`.
pub fn load_results(plan: &SweepPlan, jsondir: &Path, file: Option<&Path>) -> Result<ResidualResults, AppError> {
    let path = match file {
        Some(path) => path.to_path_buf(),
        None => jsondir.join(results_file_name(plan.night(), plan.expid())),
    };
    log::debug!("reading {}", path.display());
    read_results_json(&path)
}

/// Write `cam_plots-{night}-{expid}.html` for the plan's cameras.
pub fn plot_results(plan: &SweepPlan, results: &ResidualResults, outdir: &Path) -> Result<PathBuf, AppError> {
    let page = crate::plot::camera_plots_page(plan.night(), plan.expid(), plan.cameras(), results)?;
    let path = outdir.join(camera_plots_file_name(plan.night(), plan.expid()));
    page.write(&path)?;
    Ok(path)
}

/// run -> json -> plot. The JSON lands in the base directory.
pub fn full_analysis(
    ctx: &SweepContext<'_>,
    config: &SweepConfig,
    runner: &dyn SkyModelRunner,
    outdir: &Path,
) -> Result<(RunOutput, ResidualResults, PathBuf), AppError> {
    let run = run_analysis(ctx, &config.plan, config.seed, runner)?;
    let (_, results) = write_results(ctx.store, ctx.basedir, &config.plan, ctx.basedir)?;
    let page = plot_results(&config.plan, &results, outdir)?;
    Ok((run, results, page))
}

/// Write `sky_plots-{night}-{expid}.html` for one realization.
pub fn sky_plot(
    store: &dyn FrameStore,
    basedir: &Path,
    night: Night,
    key: ArtifactKey,
    outdir: &Path,
) -> Result<PathBuf, AppError> {
    let frame = store.read_frame(&artifact_path(basedir, ArtifactKind::Frame, &key))?;
    let sframe = store.read_frame(&artifact_path(basedir, ArtifactKind::SFrame, &key))?;

    let page = crate::plot::sky_plots_page(night, key.expid, key.camera, &frame, &sframe)?;
    let path = outdir.join(sky_plots_file_name(night, key.expid));
    page.write(&path)?;
    Ok(path)
}
