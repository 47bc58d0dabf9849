//! Pipeline configuration (TOML).
//!
//! ```toml
//! [batch]
//! state_file = "samples.csv"
//! work_root = "work"
//! jobs = 4
//!
//! [tools.solver]
//! program = "SwiftComp"
//! args = ["{input}", "3D", "H"]
//! timeout_secs = 600
//! ```
//!
//! Every field except `[tools.voxelizer]` has a default; relative paths are
//! resolved against the directory of the config file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use wvh_io::MaterialConstants;

use crate::error::ConfigError;
use crate::tool::ToolCommand;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    /// Sample table read at start and rewritten after every row
    pub state_file: PathBuf,
    /// Parent of the per-row workspaces
    pub work_root: PathBuf,
    /// Rows processed concurrently
    pub jobs: usize,
    pub keep_failed_workdirs: bool,
    pub report_file: Option<PathBuf>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from("samples.csv"),
            work_root: PathBuf::from("work"),
            jobs: 1,
            keep_failed_workdirs: false,
            report_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsConfig {
    /// Meshes the fiber-cell `.geo` into a Gmsh 2.x `.msh`
    pub mesher: ToolCommand,
    /// Homogenization solver, run once per solver input
    pub solver: ToolCommand,
    /// Writes `{prefix}.inp` and `{prefix}.ori` for the woven unit cell
    pub voxelizer: ToolCommand,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            mesher: ToolCommand::new("gmsh", &["-2", "{geo}", "-format", "msh2", "-o", "{msh}"]),
            solver: ToolCommand::new("SwiftComp", &["{input}", "3D", "H"]),
            // site specific, must come from [tools.voxelizer]
            voxelizer: ToolCommand::new("", &[]),
        }
    }
}

impl ToolsConfig {
    fn entries(&self) -> [(&'static str, &ToolCommand); 3] {
        [
            ("mesher", &self.mesher),
            ("solver", &self.solver),
            ("voxelizer", &self.voxelizer),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub batch: BatchConfig,
    pub materials: MaterialConstants,
    pub tools: ToolsConfig,
}

impl PipelineConfig {
    /// Load, resolve relative paths and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and resolve relative paths without validating the tool chain
    pub fn read(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::parse_str(&raw, path)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Parse config text; `origin` names it in errors
    pub fn parse_str(raw: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Make relative batch paths relative to `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.batch.state_file);
        resolve(&mut self.batch.work_root);
        if let Some(report) = self.batch.report_file.as_mut() {
            resolve(report);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch.jobs == 0 {
            return Err(ConfigError::NoJobs);
        }
        for (name, tool) in self.tools.entries() {
            tool.check(name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOXELIZER: &str = r#"
[tools.voxelizer]
program = "python3"
args = ["/opt/texgen/texgen_weave.py", "--width-ratio", "{width_ratio}", "--prefix", "{prefix}"]
"#;

    #[test]
    fn empty_config_reproduces_default_tool_chain() {
        let config = PipelineConfig::parse_str("", Path::new("empty.toml")).expect("empty");
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.tools.solver.args, vec!["{input}", "3D", "H"]);
        assert_eq!(config.tools.mesher.program, "gmsh");
        assert_eq!(config.materials.matrix_conductivity, 0.180);
    }

    #[test]
    fn voxelizer_must_be_configured() {
        let config = PipelineConfig::parse_str("", Path::new("empty.toml")).expect("empty");
        match config.validate() {
            Err(ConfigError::EmptyProgram { tool }) => assert_eq!(tool, "voxelizer"),
            other => panic!("expected missing voxelizer, got {other:?}"),
        }

        let config = PipelineConfig::parse_str(VOXELIZER, Path::new("v.toml")).expect("parse");
        config.validate().expect("configured voxelizer is valid");
        assert_eq!(config.tools.voxelizer.program, "python3");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let raw = r#"
[batch]
jobs = 4
report_file = "report.json"

[materials]
weave_volume = 0.5

[tools.solver]
program = "/opt/swiftcomp/bin/SwiftComp"
args = ["{input}", "3D", "H"]
timeout_secs = 600
capture = true
"#;
        let config = PipelineConfig::parse_str(raw, Path::new("p.toml")).expect("parse");
        assert_eq!(config.batch.jobs, 4);
        assert_eq!(config.batch.state_file, PathBuf::from("samples.csv"));
        assert_eq!(config.materials.weave_volume, 0.5);
        assert_eq!(config.materials.cell_volume, 1.732);
        assert_eq!(config.tools.solver.timeout_secs, Some(600));
        assert!(config.tools.solver.capture);
        assert_eq!(config.tools.mesher.program, "gmsh");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = PipelineConfig::parse_str("[batch]\nthreads = 2\n", Path::new("typo.toml"))
            .expect_err("unknown key");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn unknown_placeholder_fails_validation() {
        let raw = "[tools.solver]\nprogram = \"SwiftComp\"\nargs = [\"{mesh}\"]\n";
        let config = PipelineConfig::parse_str(raw, Path::new("bad.toml")).expect("parse");
        let err = config.validate().expect_err("unknown placeholder");
        assert!(err.to_string().contains("solver"));
    }

    #[test]
    fn zero_jobs_fails_validation() {
        let raw = format!("[batch]\njobs = 0\n{VOXELIZER}");
        let config = PipelineConfig::parse_str(&raw, Path::new("j.toml")).expect("parse");
        assert!(matches!(config.validate(), Err(ConfigError::NoJobs)));
    }

    #[test]
    fn load_resolves_paths_against_config_dir() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("pipeline.toml");
        fs::write(
            &path,
            format!(
                "[batch]\nstate_file = \"data/samples.csv\"\nwork_root = \"/scratch/wvh\"\nreport_file = \"run.json\"\n{VOXELIZER}"
            ),
        )
        .expect("write config");

        let config = PipelineConfig::load(&path).expect("load");
        assert_eq!(config.batch.state_file, dir.path().join("data/samples.csv"));
        assert_eq!(config.batch.work_root, PathBuf::from("/scratch/wvh"));
        assert_eq!(config.batch.report_file, Some(dir.path().join("run.json")));
    }

    #[test]
    fn read_skips_tool_validation() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("materials.toml");
        fs::write(&path, "[materials]\nmatrix_conductivity = 0.25\n").expect("write config");

        let config = PipelineConfig::read(&path).expect("read");
        assert_eq!(config.materials.matrix_conductivity, 0.25);
        assert!(matches!(
            PipelineConfig::load(&path),
            Err(ConfigError::EmptyProgram { .. })
        ));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = PipelineConfig::load(dir.path().join("absent.toml")).expect_err("missing");
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
