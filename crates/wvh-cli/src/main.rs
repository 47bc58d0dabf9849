mod args;

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use wvh_io::{MaterialConstants, orientation, sc_writer, stiffness};
use wvh_pipeline::{Batch, BatchSummary, CancelToken, PipelineConfig, ProcessRunner};

use crate::args::{
    CellArgs, Command, ConvertArgs, ExtractArgs, GeometryArgs, InspectArgs, RunArgs, WvhCli,
};

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn run_batch(args: RunArgs) -> Result<ExitCode> {
    let mut config = PipelineConfig::load(&args.config)?;
    if let Some(state) = args.state {
        config.batch.state_file = state;
    }
    if let Some(jobs) = args.jobs {
        config.batch.jobs = jobs;
    }
    config.validate()?;

    let summary = Batch::new(config, ProcessRunner).run(&CancelToken::new())?;
    print_summary(&summary);

    if args.strict && !summary.is_clean() {
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}

fn print_summary(summary: &BatchSummary) {
    println!("attempted: {}", summary.attempted);
    println!("succeeded: {}", summary.succeeded);
    println!("failed: {}", summary.failed);
    println!("skipped: {}", summary.skipped);
    println!("cancelled: {}", summary.cancelled);
    for failure in &summary.failures {
        println!("  row {} [{}]: {}", failure.row, failure.stage, failure.message);
    }
}

/// Material constants from `[materials]` of a config file, or the built-in ones
fn materials(config: Option<&Path>) -> Result<MaterialConstants> {
    match config {
        Some(path) => Ok(PipelineConfig::read(path)?.materials),
        None => Ok(MaterialConstants::default()),
    }
}

fn convert(args: ConvertArgs) -> Result<ExitCode> {
    let materials = materials(args.config.as_deref())?;
    let mesh = wvh_model::parse_mesh_file(&args.mesh)?;
    let fiber = stiffness::extract_file(&args.stiffness)
        .with_context(|| format!("reading {}", args.stiffness.display()))?;
    let ori = args.orientation_path();
    let orientation = orientation::load_optional(&ori)
        .with_context(|| format!("reading {}", ori.display()))?;

    sc_writer::write_weave_input_file(
        &args.output,
        &mesh,
        Some(&orientation),
        fiber,
        &materials,
    )
    .with_context(|| format!("writing {}", args.output.display()))?;
    info!(
        "wrote {} ({} nodes, {} elements)",
        args.output.display(),
        mesh.nodes().len(),
        mesh.elements().len()
    );
    Ok(ExitCode::SUCCESS)
}

fn cell(args: CellArgs) -> Result<ExitCode> {
    let materials = materials(args.config.as_deref())?;
    let mesh = wvh_io::msh::read_file(&args.mesh)?;
    sc_writer::write_cell_input_file(&args.output, &mesh, &materials)
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!("wrote {} ({} elements)", args.output.display(), mesh.elements().len());
    Ok(ExitCode::SUCCESS)
}

fn extract(args: ExtractArgs) -> Result<ExitCode> {
    let k = stiffness::extract_file(&args.file)
        .with_context(|| format!("extracting from {}", args.file.display()))?;
    if args.json {
        let value = serde_json::json!({ "k11": k.k11, "k22": k.k22, "k33": k.k33 });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{} {} {}", k.k11, k.k22, k.k33);
    }
    Ok(ExitCode::SUCCESS)
}

fn inspect(args: InspectArgs) -> Result<ExitCode> {
    let mesh = wvh_model::parse_mesh_file(&args.mesh)?;
    println!("{}", mesh.statistics().format());
    if let Err(err) = mesh.ensure_hexahedral() {
        println!("warning: {err}");
    }
    Ok(ExitCode::SUCCESS)
}

fn geometry(args: GeometryArgs) -> Result<ExitCode> {
    let materials = materials(args.config.as_deref())?;
    let script = wvh_io::write_fiber_cell(args.volume_fraction, &materials)?;
    match &args.output {
        Some(path) => {
            fs::write(path, script).with_context(|| format!("writing {}", path.display()))?;
            info!(
                "wrote {} (fiber radius {:.6})",
                path.display(),
                wvh_io::fiber_radius(args.volume_fraction)?
            );
        }
        None => print!("{script}"),
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let cli = WvhCli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Command::Run(args) => run_batch(args),
        Command::Convert(args) => convert(args),
        Command::Cell(args) => cell(args),
        Command::Extract(args) => extract(args),
        Command::Inspect(args) => inspect(args),
        Command::Geometry(args) => geometry(args),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(2)
        }
    }
}
