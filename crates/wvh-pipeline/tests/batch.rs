//! Batch behaviour with scripted tools standing in for the mesher, solver and voxelizer.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::TempDir;
use wvh_io::{RowStatus, SampleTable, load_report};
use wvh_pipeline::{
    Batch, BatchError, CancelToken, PipelineConfig, Stage, ToolError, ToolInvocation, ToolRunner,
};

const CELL_MSH: &str = "$MeshFormat
2.2 0 8
$EndMeshFormat
$Nodes
4
1 0 0 0
2 1 0 0
3 1 1 0
4 0 1 0
$EndNodes
$Elements
3
1 1 2 1 3 1 2
2 2 2 1 24 1 2 3
3 2 2 2 34 1 3 4
$EndElements
";

const VOXEL_INP: &str = "*Heading
voxel mesh
*Node
1, 0, 0, 0
2, 1, 0, 0
3, 1, 1, 0
4, 0, 1, 0
5, 0, 0, 1
6, 1, 0, 1
7, 1, 1, 1
8, 0, 1, 1
*Element, Type=C3D8R
1, 1, 2, 3, 4,
5, 6, 7, 8
*ElSet, ElSet=Yarn0
1
";

const SAMPLES: &str = "Vf,Width to Spacing,Thickness to Spacing
0.30,0.60,0.20
0.35,0.65,0.25
0.40,0.70,0.30
0.45,0.75,0.35
0.50,0.80,0.40
";

/// Writes the files each real tool would produce
#[derive(Default)]
struct ScriptedTools {
    fail: HashSet<(usize, Stage)>,
    cancel_after: Option<(usize, Stage, CancelToken)>,
    calls: Mutex<Vec<(usize, Stage)>>,
}

impl ScriptedTools {
    fn failing(row: usize, stage: Stage) -> Self {
        Self {
            fail: HashSet::from([(row, stage)]),
            ..Self::default()
        }
    }

    fn rows_called(&self) -> Vec<usize> {
        let calls = self.calls.lock().expect("calls lock");
        let mut rows: Vec<usize> = calls.iter().map(|(row, _)| *row).collect();
        rows.sort_unstable();
        rows.dedup();
        rows
    }
}

fn row_of(workdir: &Path) -> usize {
    workdir
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_prefix("row-"))
        .and_then(|digits| digits.parse().ok())
        .expect("workspace named row-NNNNN")
}

fn stiffness_output(k11: f64, k33: f64) -> String {
    format!(
        "The Effective Stiffness Matrix\n{k11} 0 0\n0 {k33} 0\n0 0 {k33}\n\nThe Effective Compliance Matrix\n"
    )
}

impl ToolRunner for ScriptedTools {
    fn run(&self, invocation: &ToolInvocation) -> Result<(), ToolError> {
        let row = row_of(&invocation.workdir);
        let stage = invocation.stage;
        self.calls.lock().expect("calls lock").push((row, stage));

        if self.fail.contains(&(row, stage)) {
            return Err(ToolError::ExitStatus {
                program: invocation.program.clone(),
                code: Some(1),
            });
        }

        let dir = &invocation.workdir;
        let write = |name: &str, body: &str| {
            fs::write(dir.join(name), body).expect("scripted tool output");
        };
        match stage {
            Stage::ExternalMesh => write("Trial.msh", CELL_MSH),
            Stage::FirstSolve => write(
                &format!("{}.k", invocation.args[0]),
                &stiffness_output(3.98, 0.543),
            ),
            Stage::Voxelize => write("PlainWeave.inp", VOXEL_INP),
            Stage::SecondSolve => write(
                &format!("{}.k", invocation.args[0]),
                &stiffness_output(row as f64 + 0.25, row as f64 + 0.125),
            ),
            other => panic!("no tool runs at {other}"),
        }

        if let Some((cancel_row, cancel_stage, token)) = &self.cancel_after
            && *cancel_row == row
            && *cancel_stage == stage
        {
            token.cancel();
        }
        Ok(())
    }
}

fn setup(samples: &str) -> (TempDir, PipelineConfig) {
    let dir = tempfile::tempdir().expect("temp dir");
    let state = dir.path().join("samples.csv");
    fs::write(&state, samples).expect("write samples");

    let mut config = PipelineConfig::default();
    config.batch.state_file = state;
    config.batch.work_root = dir.path().join("work");
    (dir, config)
}

fn results(path: &Path) -> Vec<(Option<f64>, Option<f64>)> {
    let table = SampleTable::load(path).expect("reload table");
    (0..table.len())
        .map(|row| {
            let sample = table.sample(row).expect("decode row");
            (sample.k11, sample.k33)
        })
        .collect()
}

fn workdir(config: &PipelineConfig, row: usize) -> PathBuf {
    config.batch.work_root.join(format!("row-{row:05}"))
}

#[test]
fn failing_row_is_isolated() {
    let (_dir, mut config) = setup(SAMPLES);
    config.batch.keep_failed_workdirs = true;
    let state = config.batch.state_file.clone();
    let batch = Batch::new(config, ScriptedTools::failing(2, Stage::SecondSolve));

    let summary = batch.run(&CancelToken::new()).expect("batch should finish");
    assert_eq!(summary.attempted, 5);
    assert_eq!(summary.succeeded, 4);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].row, 2);
    assert_eq!(summary.failures[0].stage, Stage::SecondSolve);
    assert!(summary.failures[0].message.contains("exited with status 1"));

    let results = results(&state);
    assert_eq!(results[2], (None, None));
    for row in [0usize, 1, 3, 4] {
        assert_eq!(
            results[row],
            (Some(row as f64 + 0.25), Some(row as f64 + 0.125))
        );
    }

    let config = batch.config();
    assert!(workdir(config, 2).join("Output.sc").exists());
    assert!(!workdir(config, 0).exists());
}

#[test]
fn resumed_batch_skips_complete_rows() {
    let samples = "Vf,Width to Spacing,Thickness to Spacing,k11,k33
0.30,0.60,0.20,1.5,0.5
0.35,0.65,0.25,1.6,0.6
0.40,0.70,0.30,1.7,0.7
0.45,0.75,0.35,,
0.50,0.80,0.40,2.0,
";
    let (_dir, config) = setup(samples);
    let state = config.batch.state_file.clone();
    let tools = ScriptedTools::default();
    let batch = Batch::new(config, &tools);

    let summary = batch.run(&CancelToken::new()).expect("batch should finish");
    assert_eq!(tools.rows_called(), vec![3, 4]);
    assert_eq!(summary.skipped, 3);
    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.succeeded, 2);

    let results = results(&state);
    assert_eq!(results[0], (Some(1.5), Some(0.5)));
    assert_eq!(results[2], (Some(1.7), Some(0.7)));
    assert_eq!(results[3], (Some(3.25), Some(3.125)));
    assert_eq!(results[4], (Some(4.25), Some(4.125)));
}

#[test]
fn resume_runs_only_unfinished_rows() {
    let (_dir, config) = setup(SAMPLES);
    let state = config.batch.state_file.clone();
    let batch = Batch::new(config.clone(), ScriptedTools::failing(3, Stage::Voxelize));
    let first = batch.run(&CancelToken::new()).expect("first run");
    assert_eq!(first.failed, 1);

    let tools = ScriptedTools::default();
    let retry = Batch::new(config, &tools);
    let second = retry.run(&CancelToken::new()).expect("second run");
    assert_eq!(second.skipped, 4);
    assert_eq!(second.succeeded, 1);
    assert_eq!(tools.rows_called(), vec![3]);
    assert!(results(&state).iter().all(|(k11, k33)| k11.is_some() && k33.is_some()));
}

#[test]
fn parallel_batch_matches_sequential_results() {
    let (_dir, mut config) = setup(SAMPLES);
    config.batch.jobs = 3;
    let state = config.batch.state_file.clone();
    let tools = ScriptedTools::failing(2, Stage::FirstSolve);
    let batch = Batch::new(config, tools);

    let summary = batch.run(&CancelToken::new()).expect("batch should finish");
    assert_eq!(summary.succeeded, 4);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures[0].stage, Stage::FirstSolve);

    let results = results(&state);
    assert_eq!(results[2], (None, None));
    assert_eq!(results[4], (Some(4.25), Some(4.125)));
}

#[test]
fn cancellation_stops_at_stage_boundary() {
    let (_dir, config) = setup(SAMPLES);
    let state = config.batch.state_file.clone();
    let cancel = CancelToken::new();
    let tools = ScriptedTools {
        cancel_after: Some((1, Stage::Voxelize, cancel.clone())),
        ..ScriptedTools::default()
    };
    let batch = Batch::new(config, tools);

    let summary = batch.run(&cancel).expect("cancelled batch still returns");
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.cancelled, 4);
    assert!(!summary.is_clean());

    let results = results(&state);
    assert_eq!(results[0], (Some(0.25), Some(0.125)));
    assert!(results[1..].iter().all(|result| *result == (None, None)));
}

#[test]
fn tools_run_in_stage_order() {
    let (_dir, config) = setup("Vf,Width to Spacing,Thickness to Spacing\n0.30,0.60,0.20\n");
    let tools = ScriptedTools::default();
    let batch = Batch::new(config, &tools);
    batch.run(&CancelToken::new()).expect("batch should finish");

    let calls = tools.calls.lock().expect("calls lock").clone();
    assert_eq!(
        calls,
        vec![
            (0, Stage::ExternalMesh),
            (0, Stage::FirstSolve),
            (0, Stage::Voxelize),
            (0, Stage::SecondSolve),
        ]
    );
}

#[test]
fn report_lists_every_attempted_row() {
    let (dir, mut config) = setup(SAMPLES);
    let report_path = dir.path().join("reports").join("run.json");
    config.batch.report_file = Some(report_path.clone());
    let batch = Batch::new(config, ScriptedTools::failing(4, Stage::ExternalMesh));

    batch.run(&CancelToken::new()).expect("batch should finish");
    let report = load_report(&report_path).expect("report written");
    assert_eq!(report.rows.len(), 5);
    assert_eq!(report.count(RowStatus::Succeeded), 4);
    assert_eq!(report.rows[4].status, RowStatus::Failed);
    assert_eq!(report.rows[4].stage.as_deref(), Some("external-mesh"));
    assert!(report.finished_at.is_some());
}

#[test]
fn missing_state_file_is_fatal() {
    let (dir, mut config) = setup(SAMPLES);
    config.batch.state_file = dir.path().join("absent.csv");
    let tools = ScriptedTools::default();
    let batch = Batch::new(config, tools);

    let err = batch.run(&CancelToken::new()).expect_err("no table");
    assert!(matches!(err, BatchError::Table(_)));
}
