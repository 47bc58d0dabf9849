//! Batch loop over the sample table.
//!
//! Rows with both results set are skipped, so re-running a batch resumes it.
//! Finished rows are recorded by a single owner of the table, which rewrites
//! the state file after each one; with `jobs > 1` the rows run on a rayon pool
//! and send their outcomes to that owner over a channel.

use std::fs;
use std::sync::mpsc;
use std::thread;

use chrono::Utc;
use log::{info, warn};
use rayon::prelude::*;
use wvh_io::{RowReport, RowStatus, RunReport, SampleTable, save_report};

use crate::config::PipelineConfig;
use crate::error::BatchError;
use crate::row::{CancelToken, RowOutcome, RowPipeline};
use crate::stage::Stage;
use crate::tool::ToolRunner;

/// A row that ended in `Failure`
#[derive(Debug, Clone, PartialEq)]
pub struct RowFailure {
    pub row: usize,
    pub stage: Stage,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    /// Rows that ran to success or failure
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Rows already complete when the batch started
    pub skipped: usize,
    pub cancelled: usize,
    pub failures: Vec<RowFailure>,
}

impl BatchSummary {
    /// No row failed or was cancelled
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.cancelled == 0
    }
}

pub struct Batch<R: ToolRunner> {
    config: PipelineConfig,
    runner: R,
}

impl<R: ToolRunner> Batch<R> {
    pub fn new(config: PipelineConfig, runner: R) -> Self {
        Self { config, runner }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process every pending row of the state table
    pub fn run(&self, cancel: &CancelToken) -> Result<BatchSummary, BatchError> {
        let batch = &self.config.batch;
        let table = SampleTable::load(&batch.state_file)?;
        fs::create_dir_all(&batch.work_root).map_err(|source| BatchError::WorkRoot {
            path: batch.work_root.clone(),
            source,
        })?;

        let pending = table.pending_rows();
        let jobs = batch.jobs.max(1);
        info!(
            "{}: {} rows, {} pending, {} jobs",
            table.path().display(),
            table.len(),
            pending.len(),
            jobs
        );

        let mut recorder = Recorder::new(table, jobs);
        recorder.summary.skipped = recorder.table.len() - pending.len();
        recorder.report.skipped = recorder.summary.skipped;

        let recorder = if jobs == 1 {
            for &row in &pending {
                let outcome = self.run_row(&recorder.table, row, cancel);
                recorder.record(row, outcome)?;
            }
            recorder
        } else {
            self.run_parallel(recorder, &pending, jobs, cancel)?
        };

        recorder.finish(batch.report_file.as_deref())
    }

    fn run_parallel(
        &self,
        recorder: Recorder,
        pending: &[usize],
        jobs: usize,
        cancel: &CancelToken,
    ) -> Result<Recorder, BatchError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .thread_name(|i| format!("wvh-row-{i}"))
            .build()?;
        // rows read their parameters from a snapshot; the recorder owns the live table
        let snapshot = recorder.table.clone();
        let (tx, rx) = mpsc::channel::<(usize, RowOutcome)>();

        thread::scope(|scope| {
            let writer = scope.spawn(move || {
                let mut recorder = recorder;
                for (row, outcome) in rx {
                    if let Err(err) = recorder.record(row, outcome) {
                        cancel.cancel();
                        return Err(err);
                    }
                }
                Ok(recorder)
            });

            pool.install(|| {
                pending.par_iter().for_each_with(tx, |tx, &row| {
                    let outcome = self.run_row(&snapshot, row, cancel);
                    // the writer only hangs up after a fatal error
                    let _ = tx.send((row, outcome));
                });
            });

            writer.join().map_err(|_| BatchError::WriterPanicked)?
        })
    }

    fn run_row(&self, table: &SampleTable, row: usize, cancel: &CancelToken) -> RowOutcome {
        match table.sample(row) {
            Ok(sample) => RowPipeline::new(&self.config, &self.runner).run(row, &sample, cancel),
            Err(err) => {
                let outcome = RowOutcome::Failure {
                    stage: Stage::GeometrySynthesis,
                    message: err.to_string(),
                };
                warn!("row {row}: {err}");
                outcome
            }
        }
    }
}

/// Sole writer of the state table during a batch
struct Recorder {
    table: SampleTable,
    summary: BatchSummary,
    report: RunReport,
}

impl Recorder {
    fn new(table: SampleTable, jobs: usize) -> Self {
        let report = RunReport::new(table.path().display().to_string(), jobs);
        Self {
            table,
            summary: BatchSummary::default(),
            report,
        }
    }

    fn record(&mut self, row: usize, outcome: RowOutcome) -> Result<(), BatchError> {
        let mut entry = RowReport {
            row,
            status: RowStatus::Succeeded,
            stage: None,
            message: None,
            k11: None,
            k33: None,
            finished_at: Utc::now(),
        };

        match outcome {
            RowOutcome::Success { k11, k33 } => {
                self.summary.attempted += 1;
                self.summary.succeeded += 1;
                self.table.set_result(row, k11, k33)?;
                self.table.save()?;
                entry.k11 = Some(k11);
                entry.k33 = Some(k33);
            }
            RowOutcome::Failure { stage, message } => {
                self.summary.attempted += 1;
                self.summary.failed += 1;
                self.table.save()?;
                entry.status = RowStatus::Failed;
                entry.stage = Some(stage.as_str().to_string());
                entry.message = Some(message.clone());
                self.summary.failures.push(RowFailure {
                    row,
                    stage,
                    message,
                });
            }
            RowOutcome::Cancelled { stage } => {
                self.summary.cancelled += 1;
                entry.status = RowStatus::Cancelled;
                entry.stage = Some(stage.as_str().to_string());
            }
        }

        self.report.rows.push(entry);
        Ok(())
    }

    fn finish(mut self, report_file: Option<&std::path::Path>) -> Result<BatchSummary, BatchError> {
        self.summary.failures.sort_by_key(|failure| failure.row);
        let summary = self.summary;
        info!(
            "batch finished: {} succeeded, {} failed, {} skipped, {} cancelled",
            summary.succeeded, summary.failed, summary.skipped, summary.cancelled
        );

        if let Some(path) = report_file {
            self.report.finish();
            save_report(path, &self.report).map_err(|source| BatchError::Report {
                path: path.to_path_buf(),
                source,
            })?;
        }
        Ok(summary)
    }
}
