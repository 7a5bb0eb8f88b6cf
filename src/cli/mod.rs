//! Command-line parsing for the sky-subtraction commissioning tool.
//!
//! Parsing stays here; `app` maps the parsed arguments into a `SweepConfig` and
//! dispatches.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::domain::{Camera, ExposureId, Night};
use crate::pipeline::DEFAULT_SKY_COMMAND;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "skysub",
    version,
    about = "Sky-subtraction quality vs. number of sky fibers (DESI commissioning)"
)]
pub struct Cli {
    /// Raise log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate frame, sky and sframe files, write the JSON statistics and plot them.
    Full(FullArgs),
    /// Generate frame, sky and sframe files for every sky-fiber count.
    Run(RunArgs),
    /// Write the JSON residual statistics for existing sframe files.
    Json(JsonArgs),
    /// Plot a previously written JSON file.
    Plot(PlotArgs),
    /// Plot raw vs. sky-subtracted spectra of one realization.
    Skyplot(SkyplotArgs),
}

/// Exposure and sweep options shared by every sweep command.
#[derive(Debug, Args, Clone)]
pub struct SweepArgs {
    /// Night of the exposure (YYYYMMDD).
    #[arg(short = 'n', long)]
    pub night: Night,

    /// Exposure id, without zero padding.
    #[arg(short = 'e', long)]
    pub expid: ExposureId,

    /// Cameras to analyze, e.g. `-c r3 b3 z3` or `-c r3,b3,z3`.
    #[arg(short = 'c', long, required = true, num_args = 1.., value_delimiter = ',')]
    pub cameras: Vec<Camera>,

    /// Numbers of sky fibers to build models from.
    #[arg(long, num_args = 1.., value_delimiter = ',', default_values_t = crate::domain::DEFAULT_NSKY_LIST)]
    pub nsky_list: Vec<usize>,

    /// Realizations per sky-fiber count.
    #[arg(short = 'r', long, default_value_t = crate::domain::DEFAULT_REPS)]
    pub reps: usize,
}

/// Options controlling frame generation and the sky-model tool.
#[derive(Debug, Args, Clone)]
pub struct GenerateArgs {
    /// Seed for sky-fiber sampling; each realization derives its own stream from it.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Program invoked to compute sky models.
    #[arg(long, default_value = DEFAULT_SKY_COMMAND)]
    pub sky_command: String,
}

#[derive(Debug, Args, Clone)]
pub struct FullArgs {
    #[command(flatten)]
    pub sweep: SweepArgs,

    /// Directory for generated frame, sky, sframe and JSON files.
    #[arg(short = 'b', long)]
    pub basedir: PathBuf,

    /// Directory for HTML plots (defaults to the base directory).
    #[arg(short = 'o', long)]
    pub outdir: Option<PathBuf>,

    #[command(flatten)]
    pub generate: GenerateArgs,
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub sweep: SweepArgs,

    /// Directory for generated frame, sky and sframe files.
    #[arg(short = 'b', long)]
    pub basedir: PathBuf,

    #[command(flatten)]
    pub generate: GenerateArgs,
}

#[derive(Debug, Args, Clone)]
pub struct JsonArgs {
    #[command(flatten)]
    pub sweep: SweepArgs,

    /// Where to look for sframe files.
    #[arg(long)]
    pub basedir: PathBuf,

    /// Directory to write the JSON file to.
    #[arg(long)]
    pub jsondir: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct PlotArgs {
    #[command(flatten)]
    pub sweep: SweepArgs,

    /// Where to look for `data-{night}-{expid}.json`.
    #[arg(long)]
    pub jsondir: PathBuf,

    /// Directory to write the HTML plots to.
    #[arg(long)]
    pub outdir: PathBuf,

    /// Read this JSON file instead of the one in `--jsondir`.
    #[arg(long, value_name = "JSON")]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct SkyplotArgs {
    /// Night of the exposure (YYYYMMDD).
    #[arg(short = 'n', long)]
    pub night: Night,

    /// Exposure id, without zero padding.
    #[arg(short = 'e', long)]
    pub expid: ExposureId,

    /// Single camera to plot.
    #[arg(short = 'c', long)]
    pub cam: Camera,

    /// Number of sky fibers the model was built from.
    #[arg(long, default_value_t = 50)]
    pub nsky: usize,

    /// Realization to plot.
    #[arg(long, default_value_t = 0)]
    pub rep: usize,

    /// Where to look for frame and sframe files.
    #[arg(long)]
    pub basedir: PathBuf,

    /// Directory to write the HTML plot to.
    #[arg(long)]
    pub outdir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("skysub").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn full_accepts_space_and_comma_separated_cameras() {
        let cli = parse(&["full", "-n", "20200315", "-e", "55654", "-c", "r3", "b3,z3", "-b", "/tmp/out"]);
        let Command::Full(args) = cli.command else {
            panic!("expected full");
        };
        let cams: Vec<String> = args.sweep.cameras.iter().map(|c| c.to_string()).collect();
        assert_eq!(cams, vec!["r3", "b3", "z3"]);
        assert_eq!(args.sweep.nsky_list, crate::domain::DEFAULT_NSKY_LIST.to_vec());
        assert_eq!(args.sweep.reps, 5);
        assert_eq!(args.generate.seed, 42);
        assert_eq!(args.generate.sky_command, "desi_compute_sky");
        assert!(args.outdir.is_none());
    }

    #[test]
    fn nsky_list_and_verbosity_are_parsed() {
        let cli = parse(&[
            "-vv", "json", "-n", "20200315", "-e", "7", "-c", "z0", "--nsky-list", "1", "2", "--reps", "3",
            "--basedir", "b", "--jsondir", "j",
        ]);
        assert_eq!(cli.verbose, 2);
        let Command::Json(args) = cli.command else {
            panic!("expected json");
        };
        assert_eq!(args.sweep.nsky_list, vec![1, 2]);
        assert_eq!(args.sweep.reps, 3);
    }

    #[test]
    fn skyplot_defaults() {
        let cli = parse(&[
            "skyplot", "-n", "20200315", "-e", "7", "-c", "b1", "--basedir", "b", "--outdir", "o",
        ]);
        let Command::Skyplot(args) = cli.command else {
            panic!("expected skyplot");
        };
        assert_eq!((args.nsky, args.rep), (50, 0));
        assert_eq!(args.cam.to_string(), "b1");
    }

    #[test]
    fn invalid_identifiers_are_rejected() {
        let bad_cam = ["skysub", "run", "-n", "20200315", "-e", "1", "-c", "x9", "-b", "b"];
        assert!(Cli::try_parse_from(bad_cam).is_err());
        let bad_night = ["skysub", "run", "-n", "2020-03-15", "-e", "1", "-c", "r1", "-b", "b"];
        assert!(Cli::try_parse_from(bad_night).is_err());
    }
}
