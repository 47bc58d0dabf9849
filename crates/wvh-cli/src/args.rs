use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Woven-composite homogenization pipeline.
#[derive(Debug, Parser)]
#[command(name = "wvh", version)]
pub struct WvhCli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    /// More log output (-v debug, -vv trace).
    pub verbose: u8,

    #[arg(short, long, global = true, conflicts_with = "verbose")]
    /// Only log warnings and errors.
    pub quiet: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run every pending row of the sample table.
    Run(RunArgs),

    /// Convert a voxel mesh into weave solver input.
    Convert(ConvertArgs),

    /// Convert a Gmsh 2.x fiber-cell mesh into solver input.
    Cell(CellArgs),

    /// Print the effective stiffness diagonal of a solver output file.
    Extract(ExtractArgs),

    /// Print statistics of a voxel mesh.
    Inspect(InspectArgs),

    /// Write the fiber-cell .geo script for a volume fraction.
    Geometry(GeometryArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[arg(short, long)]
    /// Pipeline config (TOML).
    pub config: PathBuf,

    #[arg(long)]
    /// Sample table, overriding batch.state_file.
    pub state: Option<PathBuf>,

    #[arg(short, long)]
    /// Concurrent rows, overriding batch.jobs.
    pub jobs: Option<usize>,

    #[arg(long)]
    /// Exit non-zero when any row failed.
    pub strict: bool,
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    #[arg(short, long)]
    /// Voxel mesh (.inp).
    pub mesh: PathBuf,

    #[arg(short, long)]
    /// Fiber-cell solver output (*.sc.k).
    pub stiffness: PathBuf,

    #[arg(long)]
    /// Orientation file (.ori), default: the mesh path with an .ori extension.
    /// A missing file gives zero orientations.
    pub orientation: Option<PathBuf>,

    #[arg(short, long)]
    /// Solver input to write.
    pub output: PathBuf,

    #[arg(short, long)]
    /// Pipeline config whose [materials] table replaces the built-in constants.
    pub config: Option<PathBuf>,
}

impl ConvertArgs {
    pub fn orientation_path(&self) -> PathBuf {
        self.orientation
            .clone()
            .unwrap_or_else(|| self.mesh.with_extension("ori"))
    }
}

#[derive(Debug, Args)]
pub struct CellArgs {
    #[arg(short, long)]
    /// Fiber-cell mesh (.msh, Gmsh 2.x ASCII).
    pub mesh: PathBuf,

    #[arg(short, long)]
    /// Solver input to write.
    pub output: PathBuf,

    #[arg(short, long)]
    /// Pipeline config whose [materials] table replaces the built-in constants.
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Solver output (*.sc.k).
    pub file: PathBuf,

    #[arg(long)]
    /// Print JSON instead of plain numbers.
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Voxel mesh (.inp).
    pub mesh: PathBuf,
}

#[derive(Debug, Args)]
pub struct GeometryArgs {
    #[arg(long = "vf")]
    /// Fiber volume fraction of the cell.
    pub volume_fraction: f64,

    #[arg(short, long)]
    /// Output path; the script goes to stdout when omitted.
    pub output: Option<PathBuf>,

    #[arg(short, long)]
    /// Pipeline config whose [materials] table replaces the built-in constants.
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        WvhCli::command().debug_assert();
    }

    #[test]
    fn run_accepts_overrides() {
        let cli = WvhCli::try_parse_from([
            "wvh", "run", "--config", "p.toml", "--state", "s.csv", "-j", "4", "--strict", "-v",
        ])
        .expect("valid arguments");
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Run(run) => {
                assert_eq!(run.config, PathBuf::from("p.toml"));
                assert_eq!(run.state, Some(PathBuf::from("s.csv")));
                assert_eq!(run.jobs, Some(4));
                assert!(run.strict);
            }
            other => panic!("expected run, got {other:?}"),
        }
    }

    #[test]
    fn convert_requires_mesh_and_stiffness() {
        assert!(WvhCli::try_parse_from(["wvh", "convert", "--output", "Output.sc"]).is_err());
        let cli = WvhCli::try_parse_from([
            "wvh",
            "convert",
            "--mesh",
            "PlainWeave.inp",
            "--stiffness",
            "Trial.sc.k",
            "--output",
            "Output.sc",
        ])
        .expect("valid arguments");
        match cli.command {
            Command::Convert(args) => {
                assert!(args.orientation.is_none());
                assert!(args.config.is_none());
                assert_eq!(args.orientation_path(), PathBuf::from("PlainWeave.ori"));
            }
            other => panic!("expected convert, got {other:?}"),
        }
    }

    #[test]
    fn convert_takes_explicit_orientation_and_config() {
        let cli = WvhCli::try_parse_from([
            "wvh",
            "convert",
            "-m",
            "row/PlainWeave.inp",
            "-s",
            "row/Trial.sc.k",
            "--orientation",
            "other.ori",
            "-c",
            "pipeline.toml",
            "-o",
            "Output.sc",
        ])
        .expect("valid arguments");
        match cli.command {
            Command::Convert(args) => {
                assert_eq!(args.orientation_path(), PathBuf::from("other.ori"));
                assert_eq!(args.config, Some(PathBuf::from("pipeline.toml")));
            }
            other => panic!("expected convert, got {other:?}"),
        }
    }

    #[test]
    fn cell_and_geometry_accept_config() {
        let cli = WvhCli::try_parse_from([
            "wvh", "cell", "-m", "Trial.msh", "-o", "Trial.sc", "--config", "p.toml",
        ])
        .expect("valid arguments");
        assert!(matches!(cli.command, Command::Cell(CellArgs { config: Some(_), .. })));

        let cli = WvhCli::try_parse_from(["wvh", "geometry", "--vf", "0.4", "-c", "p.toml"])
            .expect("valid arguments");
        assert!(matches!(cli.command, Command::Geometry(GeometryArgs { config: Some(_), .. })));
    }

    #[test]
    fn geometry_takes_vf() {
        let cli = WvhCli::try_parse_from(["wvh", "geometry", "--vf", "0.5"]).expect("valid");
        match cli.command {
            Command::Geometry(args) => {
                assert_eq!(args.volume_fraction, 0.5);
                assert!(args.output.is_none());
            }
            other => panic!("expected geometry, got {other:?}"),
        }
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(WvhCli::try_parse_from(["wvh", "-q", "-v", "inspect", "m.inp"]).is_err());
    }
}
