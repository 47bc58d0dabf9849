//! Per-row working directories.
//!
//! Every row runs in `work_root/row-NNNNN` so concurrent rows never share the
//! fixed artifact names the external tools expect.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::stage::Stage;

pub const CELL_GEO: &str = "Trial.geo";
pub const CELL_MSH: &str = "Trial.msh";
pub const CELL_INPUT: &str = "Trial.sc";
pub const WEAVE_PREFIX: &str = "PlainWeave";
pub const WEAVE_INPUT: &str = "Output.sc";

/// Solver output name for a given input file
pub fn solver_output(input: &str) -> String {
    format!("{input}.k")
}

#[derive(Debug)]
pub struct RowWorkspace {
    root: PathBuf,
}

impl RowWorkspace {
    /// Create a fresh workspace, clearing leftovers of an earlier attempt
    pub fn create(work_root: &Path, row: usize) -> io::Result<Self> {
        let root = work_root.join(Self::dir_name(row));
        if root.exists() {
            fs::remove_dir_all(&root)?;
        }
        fs::create_dir_all(&root)?;
        // tools run with this as cwd, so placeholders must not depend on ours
        let root = fs::canonicalize(&root)?;
        Ok(Self { root })
    }

    pub fn dir_name(row: usize) -> String {
        format!("row-{row:05}")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn geo(&self) -> PathBuf {
        self.path(CELL_GEO)
    }

    pub fn msh(&self) -> PathBuf {
        self.path(CELL_MSH)
    }

    pub fn cell_input(&self) -> PathBuf {
        self.path(CELL_INPUT)
    }

    pub fn cell_output(&self) -> PathBuf {
        self.path(&solver_output(CELL_INPUT))
    }

    pub fn weave_mesh(&self) -> PathBuf {
        self.path(&format!("{WEAVE_PREFIX}.inp"))
    }

    pub fn orientation(&self) -> PathBuf {
        self.path(&format!("{WEAVE_PREFIX}.ori"))
    }

    pub fn weave_input(&self) -> PathBuf {
        self.path(WEAVE_INPUT)
    }

    pub fn weave_output(&self) -> PathBuf {
        self.path(&solver_output(WEAVE_INPUT))
    }

    pub fn log(&self, stage: Stage) -> PathBuf {
        self.path(&format!("{}.log", stage.as_str()))
    }

    /// Remove the directory unless it should be kept for inspection
    pub fn finish(self, keep: bool) {
        if keep {
            debug!("keeping workspace {}", self.root.display());
            return;
        }
        if let Err(err) = fs::remove_dir_all(&self.root) {
            warn!("failed to remove workspace {}: {err}", self.root.display());
        }
    }
}
