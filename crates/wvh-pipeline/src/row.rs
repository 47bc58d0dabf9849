//! One row of the batch: sample parameters in, effective conductivities out.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use wvh_io::{IoError, Sample, check_unit_interval, orientation, sc_writer, stiffness};

use crate::config::PipelineConfig;
use crate::error::{StageError, StageFailure};
use crate::stage::Stage;
use crate::tool::{Placeholders, ToolCommand, ToolRunner};
use crate::workspace::{self, RowWorkspace};

/// Shared cancellation flag, checked between stages
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Terminal state of a row
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Success { k11: f64, k33: f64 },
    Failure { stage: Stage, message: String },
    /// Cancelled before `stage` started
    Cancelled { stage: Stage },
}

impl RowOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RowOutcome::Success { .. })
    }

    fn from_error(err: StageError) -> Self {
        RowOutcome::Failure {
            stage: err.stage,
            message: err.source.to_string(),
        }
    }
}

enum Stop {
    Failed(StageError),
    Cancelled(Stage),
}

impl From<StageError> for Stop {
    fn from(err: StageError) -> Self {
        Stop::Failed(err)
    }
}

/// Runs the stage sequence of one row with a given tool runner
pub struct RowPipeline<'a, R: ToolRunner + ?Sized> {
    config: &'a PipelineConfig,
    runner: &'a R,
}

impl<'a, R: ToolRunner + ?Sized> RowPipeline<'a, R> {
    pub fn new(config: &'a PipelineConfig, runner: &'a R) -> Self {
        Self { config, runner }
    }

    /// Run every stage; errors never escape, they become the outcome
    pub fn run(&self, row: usize, sample: &Sample, cancel: &CancelToken) -> RowOutcome {
        if cancel.is_cancelled() {
            return RowOutcome::Cancelled {
                stage: Stage::GeometrySynthesis,
            };
        }

        let ws = match RowWorkspace::create(&self.config.batch.work_root, row) {
            Ok(ws) => ws,
            Err(err) => {
                let outcome = RowOutcome::from_error(StageError::new(
                    Stage::GeometrySynthesis,
                    IoError::from(err),
                ));
                log_outcome(row, &outcome);
                return outcome;
            }
        };

        let outcome = match self.execute(row, sample, &ws, cancel) {
            Ok((k11, k33)) => RowOutcome::Success { k11, k33 },
            Err(Stop::Failed(err)) => RowOutcome::from_error(err),
            Err(Stop::Cancelled(stage)) => RowOutcome::Cancelled { stage },
        };

        let keep = matches!(outcome, RowOutcome::Failure { .. })
            && self.config.batch.keep_failed_workdirs;
        ws.finish(keep);
        log_outcome(row, &outcome);
        outcome
    }

    fn execute(
        &self,
        row: usize,
        sample: &Sample,
        ws: &RowWorkspace,
        cancel: &CancelToken,
    ) -> Result<(f64, f64), Stop> {
        let tools = &self.config.tools;
        let materials = &self.config.materials;
        let mut vars = row_placeholders(row, sample, ws);

        checkpoint(cancel, Stage::GeometrySynthesis)?;
        at(Stage::GeometrySynthesis, || -> Result<(), IoError> {
            check_unit_interval("width ratio", sample.width_ratio)?;
            check_unit_interval("thickness ratio", sample.thickness_ratio)?;
            let script = wvh_io::write_fiber_cell(sample.volume_fraction, materials)?;
            std::fs::write(ws.geo(), script)?;
            Ok(())
        })?;

        checkpoint(cancel, Stage::ExternalMesh)?;
        self.run_tool("mesher", &tools.mesher, Stage::ExternalMesh, &vars, ws, &ws.msh())?;

        checkpoint(cancel, Stage::FirstSolve)?;
        at(Stage::FirstSolve, || -> Result<(), IoError> {
            let cell = wvh_io::msh::read_file(ws.msh())?;
            sc_writer::write_cell_input_file(ws.cell_input(), &cell, materials)?;
            Ok(())
        })?;
        vars.set("input", workspace::CELL_INPUT);
        self.run_tool("solver", &tools.solver, Stage::FirstSolve, &vars, ws, &ws.cell_output())?;

        checkpoint(cancel, Stage::Voxelize)?;
        self.run_tool("voxelizer", &tools.voxelizer, Stage::Voxelize, &vars, ws, &ws.weave_mesh())?;

        checkpoint(cancel, Stage::Merge)?;
        at(Stage::Merge, || -> Result<(), IoError> {
            let mesh = wvh_model::parse_mesh_file(ws.weave_mesh())?;
            mesh.ensure_hexahedral()?;
            let orientation = orientation::load_optional(ws.orientation())?;
            let fiber = stiffness::extract_file(ws.cell_output())?;
            debug!(
                "row {row}: yarn conductivity {} {} {}, {} oriented elements",
                fiber.k11,
                fiber.k22,
                fiber.k33,
                orientation.len()
            );
            sc_writer::write_weave_input_file(
                ws.weave_input(),
                &mesh,
                Some(&orientation),
                fiber,
                materials,
            )?;
            Ok(())
        })?;

        checkpoint(cancel, Stage::SecondSolve)?;
        vars.set("input", workspace::WEAVE_INPUT);
        self.run_tool("solver", &tools.solver, Stage::SecondSolve, &vars, ws, &ws.weave_output())?;

        checkpoint(cancel, Stage::Extract)?;
        let effective = at(Stage::Extract, || {
            stiffness::extract_file(ws.weave_output()).map_err(IoError::from)
        })?;
        Ok((effective.k11, effective.k33))
    }

    fn run_tool(
        &self,
        name: &str,
        command: &ToolCommand,
        stage: Stage,
        vars: &Placeholders,
        ws: &RowWorkspace,
        expected: &std::path::Path,
    ) -> Result<(), StageError> {
        let fail = |source: StageFailure| StageError::new(stage, source);
        let invocation = command
            .invocation(name, stage, vars, ws.root())
            .map_err(|err| fail(err.into()))?;
        self.runner
            .run(&invocation)
            .map_err(|err| fail(err.into()))?;
        if !expected.exists() {
            return Err(fail(StageFailure::MissingOutput(expected.to_path_buf())));
        }
        Ok(())
    }
}

fn row_placeholders(row: usize, sample: &Sample, ws: &RowWorkspace) -> Placeholders {
    let mut vars = Placeholders::new();
    vars.set("geo", workspace::CELL_GEO)
        .set("msh", workspace::CELL_MSH)
        .set("input", workspace::CELL_INPUT)
        .set("prefix", workspace::WEAVE_PREFIX)
        .set("width_ratio", sample.width_ratio.to_string())
        .set("thickness_ratio", sample.thickness_ratio.to_string())
        .set("volume_fraction", sample.volume_fraction.to_string())
        .set("workdir", ws.root().display().to_string())
        .set("row", row.to_string());
    vars
}

fn checkpoint(cancel: &CancelToken, next: Stage) -> Result<(), Stop> {
    if cancel.is_cancelled() {
        Err(Stop::Cancelled(next))
    } else {
        Ok(())
    }
}

fn at<T, E: Into<StageFailure>>(
    stage: Stage,
    step: impl FnOnce() -> Result<T, E>,
) -> Result<T, StageError> {
    step().map_err(|err| StageError::new(stage, err))
}

fn log_outcome(row: usize, outcome: &RowOutcome) {
    match outcome {
        RowOutcome::Success { k11, k33 } => info!("row {row}: k11 = {k11}, k33 = {k33}"),
        RowOutcome::Failure { stage, message } => warn!("row {row}: {stage} failed: {message}"),
        RowOutcome::Cancelled { stage } => info!("row {row}: cancelled before {stage}"),
    }
}
