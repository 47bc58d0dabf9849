//! Error types for wvh-pipeline
//!
//! `ToolError` and `StageError` are scoped to one row and end up in the row's
//! `Failure` outcome. Only `ConfigError` and `BatchError` stop a batch.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use wvh_io::{IoError, TableError};

use crate::stage::Stage;

/// Failure of one external tool invocation
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {}", exit_text(.code))]
    ExitStatus { program: String, code: Option<i32> },

    #[error("{program} timed out after {seconds:.1}s and was killed")]
    TimedOut { program: String, seconds: f64 },

    #[error("failed to wait for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to open tool log {path}: {source}")]
    Log {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn exit_text(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

/// What went wrong inside a stage
#[derive(Error, Debug)]
pub enum StageFailure {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Data(#[from] IoError),

    #[error("expected output {} was not produced", .0.display())]
    MissingOutput(PathBuf),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A row stopped at `stage`
#[derive(Error, Debug)]
#[error("{stage} failed: {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: StageFailure,
}

impl StageError {
    pub fn new(stage: Stage, source: impl Into<StageFailure>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}

/// Configuration problems, all detected before the first row runs
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("tool '{tool}' has no program, set [tools.{tool}] program")]
    EmptyProgram { tool: String },

    #[error("tool '{tool}' uses unknown placeholder '{{{name}}}'")]
    UnknownPlaceholder { tool: String, name: String },

    #[error("tool '{tool}' has an unclosed placeholder in '{arg}'")]
    UnclosedPlaceholder { tool: String, arg: String },

    #[error("batch.jobs must be at least 1")]
    NoJobs,
}

/// Errors that abort the whole batch
#[derive(Error, Debug)]
pub enum BatchError {
    #[error(transparent)]
    Table(#[from] TableError),

    #[error("failed to prepare work root {path}: {source}")]
    WorkRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("failed to write run report {path}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("table writer thread panicked")]
    WriterPanicked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_status_message_mentions_code() {
        let err = ToolError::ExitStatus {
            program: "SwiftComp".to_string(),
            code: Some(2),
        };
        assert_eq!(err.to_string(), "SwiftComp exited with status 2");

        let killed = ToolError::ExitStatus {
            program: "gmsh".to_string(),
            code: None,
        };
        assert!(killed.to_string().contains("signal"));
    }

    #[test]
    fn stage_error_names_the_stage() {
        let err = StageError::new(Stage::Merge, StageFailure::MissingOutput("Trial.sc.k".into()));
        assert_eq!(
            err.to_string(),
            "merge failed: expected output Trial.sc.k was not produced"
        );
    }

    #[test]
    fn unknown_placeholder_message_shows_braces() {
        let err = ConfigError::UnknownPlaceholder {
            tool: "solver".to_string(),
            name: "mesh".to_string(),
        };
        assert_eq!(err.to_string(), "tool 'solver' uses unknown placeholder '{mesh}'");
    }
}
