//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - reads the reduction layout from the environment
//! - maps arguments into a `SweepConfig`
//! - dispatches to the shared workflow in `app::pipeline`

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::calib::StandardCalibrator;
use crate::cli::{Command, FullArgs, JsonArgs, PlotArgs, RunArgs, SkyplotArgs, SweepArgs};
use crate::domain::{ArtifactKey, SweepPlan};
use crate::error::AppError;
use crate::io::{FrameStore, ReduxLayout, expand_dir};
use crate::pipeline::{ExternalSkyTool, SweepContext};

pub mod pipeline;

pub use pipeline::SweepConfig;

/// Entry point for the `skysub` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();
    init_logging(cli.verbose);
    // `.env` also feeds `$VAR` expansion of directory arguments.
    dotenvy::dotenv().ok();

    match cli.command {
        Command::Full(args) => handle_full(args),
        Command::Run(args) => handle_run(args),
        Command::Json(args) => handle_json(args),
        Command::Plot(args) => handle_plot(args),
        Command::Skyplot(args) => handle_skyplot(args),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

#[cfg(feature = "fits")]
fn open_store() -> Result<Box<dyn FrameStore>, AppError> {
    Ok(Box::new(crate::io::fits::FitsStore))
}

#[cfg(not(feature = "fits"))]
fn open_store() -> Result<Box<dyn FrameStore>, AppError> {
    Err(AppError::usage(
        "FITS support is not compiled in; rebuild with `--features fits` (requires cfitsio).",
    ))
}

fn plan_from_args(args: &SweepArgs) -> Result<SweepPlan, AppError> {
    SweepPlan::new(
        args.night,
        args.expid,
        args.cameras.clone(),
        args.nsky_list.clone(),
        args.reps,
    )
}

fn sweep_config(sweep: &SweepArgs, basedir: &Path, seed: u64, sky_command: &str) -> Result<SweepConfig, AppError> {
    Ok(SweepConfig {
        plan: plan_from_args(sweep)?,
        basedir: expand_dir(basedir)?,
        seed,
        sky_command: sky_command.to_string(),
    })
}

pub fn full_config_from_args(args: &FullArgs) -> Result<(SweepConfig, PathBuf), AppError> {
    let config = sweep_config(&args.sweep, &args.basedir, args.generate.seed, &args.generate.sky_command)?;
    let outdir = match &args.outdir {
        Some(dir) => expand_dir(dir)?,
        None => config.basedir.clone(),
    };
    Ok((config, outdir))
}

pub fn run_config_from_args(args: &RunArgs) -> Result<SweepConfig, AppError> {
    sweep_config(&args.sweep, &args.basedir, args.generate.seed, &args.generate.sky_command)
}

fn handle_full(args: FullArgs) -> Result<(), AppError> {
    let (config, outdir) = full_config_from_args(&args)?;
    let store = open_store()?;
    let layout = ReduxLayout::from_env();
    let ctx = SweepContext {
        store: store.as_ref(),
        calibrator: &StandardCalibrator,
        layout: &layout,
        basedir: &config.basedir,
    };
    let runner = ExternalSkyTool::new(config.sky_command.clone());

    let (run, results, _) = pipeline::full_analysis(&ctx, &config, &runner, &outdir)?;
    print!("{}", crate::report::format_run_header(&config.plan));
    println!("{}", crate::report::format_summary_table(&results));
    log_run_totals(&run);
    Ok(())
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let config = run_config_from_args(&args)?;
    let store = open_store()?;
    let layout = ReduxLayout::from_env();
    let ctx = SweepContext {
        store: store.as_ref(),
        calibrator: &StandardCalibrator,
        layout: &layout,
        basedir: &config.basedir,
    };
    let runner = ExternalSkyTool::new(config.sky_command.clone());

    let run = pipeline::run_analysis(&ctx, &config.plan, config.seed, &runner)?;
    log_run_totals(&run);
    Ok(())
}

fn log_run_totals(run: &pipeline::RunOutput) {
    log::info!(
        "{} frame(s) generated, {} sky model(s) failed, {} sframe(s) written",
        run.generated.len(),
        run.sky.failed_count(),
        run.sframes.len()
    );
}

fn handle_json(args: JsonArgs) -> Result<(), AppError> {
    let plan = plan_from_args(&args.sweep)?;
    let basedir = expand_dir(&args.basedir)?;
    let jsondir = expand_dir(&args.jsondir)?;
    let store = open_store()?;

    let (_, results) = pipeline::write_results(store.as_ref(), &basedir, &plan, &jsondir)?;
    print!("{}", crate::report::format_run_header(&plan));
    println!("{}", crate::report::format_summary_table(&results));
    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let plan = plan_from_args(&args.sweep)?;
    let jsondir = expand_dir(&args.jsondir)?;
    let outdir = expand_dir(&args.outdir)?;
    let file = args.file.as_deref().map(expand_dir).transpose()?;

    let results = pipeline::load_results(&plan, &jsondir, file.as_deref())?;
    pipeline::plot_results(&plan, &results, &outdir)?;
    Ok(())
}

fn handle_skyplot(args: SkyplotArgs) -> Result<(), AppError> {
    if args.nsky == 0 {
        return Err(AppError::usage("--nsky must be >= 1."));
    }
    let basedir = expand_dir(&args.basedir)?;
    let outdir = expand_dir(&args.outdir)?;
    let store = open_store()?;
    let key = ArtifactKey {
        camera: args.cam,
        expid: args.expid,
        nsky: args.nsky,
        rep: args.rep,
    };

    pipeline::sky_plot(store.as_ref(), &basedir, args.night, key, &outdir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};

    fn parse(args: &[&str]) -> Command {
        Cli::try_parse_from(std::iter::once("skysub").chain(args.iter().copied()))
            .unwrap()
            .command
    }

    #[test]
    fn full_outdir_defaults_to_basedir() {
        let Command::Full(args) = parse(&["full", "-n", "20200315", "-e", "55654", "-c", "r3", "-b", "/data/run"]) else {
            panic!("expected full");
        };
        let (config, outdir) = full_config_from_args(&args).unwrap();
        assert_eq!(outdir, PathBuf::from("/data/run"));
        assert_eq!(config.basedir, PathBuf::from("/data/run"));
        assert_eq!(config.plan.reps(), 5);
    }

    #[test]
    fn run_config_rejects_zero_reps() {
        let Command::Run(args) = parse(&["run", "-n", "20200315", "-e", "1", "-c", "b0", "-b", "/x", "-r", "0"]) else {
            panic!("expected run");
        };
        let err = run_config_from_args(&args).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_USAGE);
    }

    #[cfg(not(feature = "fits"))]
    #[test]
    fn store_without_fits_is_a_usage_error() {
        let err = open_store().err().unwrap();
        assert_eq!(err.exit_code(), crate::error::EXIT_USAGE);
        assert!(err.message().contains("--features fits"));
    }
}
