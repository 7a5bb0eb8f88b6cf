//! Sky-model invocation.
//!
//! The sky fit itself is done by an external command (`desi_compute_sky` by
//! default). Each realization becomes a `SkyModelJob`; a `SkyModelRunner` turns
//! the job into an outcome. Failures are logged and the sweep moves on.

use std::fmt;
use std::path::PathBuf;
use std::process::Command;

use crate::domain::{ArtifactKey, SweepPlan};
use crate::error::AppError;
use crate::io::{ArtifactKind, artifact_path};
use crate::pipeline::SweepContext;

pub const DEFAULT_SKY_COMMAND: &str = "desi_compute_sky";

/// One sky-model computation.
#[derive(Debug, Clone, PartialEq)]
pub struct SkyModelJob {
    pub key: ArtifactKey,
    pub frame: PathBuf,
    pub fiberflat: PathBuf,
    pub output: PathBuf,
}

impl SkyModelJob {
    pub fn args(&self) -> Vec<String> {
        vec![
            "-i".to_string(),
            self.frame.display().to_string(),
            "--fiberflat".to_string(),
            self.fiberflat.display().to_string(),
            "-o".to_string(),
            self.output.display().to_string(),
            "--no-extra-variance".to_string(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationOutcome {
    Succeeded,
    /// The command ran and exited unsuccessfully. `code` is `None` when killed by a signal.
    Failed { code: Option<i32> },
    /// The command could not be started at all.
    NotStarted { reason: String },
}

impl InvocationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, InvocationOutcome::Succeeded)
    }
}

impl fmt::Display for InvocationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationOutcome::Succeeded => write!(f, "OK"),
            InvocationOutcome::Failed { code: Some(code) } => write!(f, "FAILED (exit code {code})"),
            InvocationOutcome::Failed { code: None } => write!(f, "FAILED (terminated by signal)"),
            InvocationOutcome::NotStarted { reason } => write!(f, "FAILED ({reason})"),
        }
    }
}

pub trait SkyModelRunner {
    /// Command line as it is logged.
    fn describe(&self, job: &SkyModelJob) -> String;

    fn run(&self, job: &SkyModelJob) -> InvocationOutcome;
}

/// Runs the sky fit as a child process and waits for it.
#[derive(Debug, Clone)]
pub struct ExternalSkyTool {
    pub program: String,
}

impl Default for ExternalSkyTool {
    fn default() -> Self {
        Self {
            program: DEFAULT_SKY_COMMAND.to_string(),
        }
    }
}

impl ExternalSkyTool {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }
}

impl SkyModelRunner for ExternalSkyTool {
    fn describe(&self, job: &SkyModelJob) -> String {
        let mut line = self.program.clone();
        for arg in job.args() {
            line.push(' ');
            line.push_str(&arg);
        }
        line
    }

    fn run(&self, job: &SkyModelJob) -> InvocationOutcome {
        match Command::new(&self.program).args(job.args()).status() {
            Ok(status) if status.success() => InvocationOutcome::Succeeded,
            Ok(status) => InvocationOutcome::Failed { code: status.code() },
            Err(e) => InvocationOutcome::NotStarted {
                reason: format!("could not start '{}': {e}", self.program),
            },
        }
    }
}

/// Outcome of every job in a sweep, in plan order.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub outcomes: Vec<(SkyModelJob, InvocationOutcome)>,
}

impl SweepReport {
    pub fn succeeded(&self) -> Vec<ArtifactKey> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_success())
            .map(|(job, _)| job.key)
            .collect()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| !o.is_success()).count()
    }
}

/// Build one job per plan key. The fiberflat is located once per camera.
pub fn sky_model_jobs(ctx: &SweepContext<'_>, plan: &SweepPlan) -> Result<Vec<SkyModelJob>, AppError> {
    let mut jobs = Vec::with_capacity(plan.keys().len());
    for &camera in plan.cameras() {
        let (_, fiberflat) = ctx.locate_inputs(plan.night(), plan.expid(), camera)?;
        for key in plan.keys_for(camera) {
            jobs.push(SkyModelJob {
                key,
                frame: artifact_path(ctx.basedir, ArtifactKind::Frame, &key),
                fiberflat: fiberflat.clone(),
                output: artifact_path(ctx.basedir, ArtifactKind::Sky, &key),
            });
        }
    }
    Ok(jobs)
}

/// Run every job in sequence. A failed job is reported and skipped, never retried.
pub fn compute_sky_models(
    ctx: &SweepContext<'_>,
    plan: &SweepPlan,
    runner: &dyn SkyModelRunner,
) -> Result<SweepReport, AppError> {
    let mut report = SweepReport::default();
    for job in sky_model_jobs(ctx, plan)? {
        log::info!("RUNNING {}", runner.describe(&job));
        let outcome = runner.run(&job);
        if outcome.is_success() {
            log::info!("OK");
        } else {
            log::warn!("{outcome}: {}", job.output.display());
        }
        report.outcomes.push((job, outcome));
    }

    if report.failed_count() > 0 {
        log::warn!(
            "{} of {} sky model(s) failed",
            report.failed_count(),
            report.outcomes.len()
        );
    }
    Ok(report)
}
