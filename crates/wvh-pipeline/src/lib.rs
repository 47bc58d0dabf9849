//! Orchestration of the woven-composite homogenization tool chain.
//!
//! A batch walks the sample table; every pending row runs the stages of
//! [`Stage`] in its own workspace:
//!
//! 1. write the fiber-cell `.geo` script
//! 2. mesh it with the external mesher
//! 3. convert the mesh and homogenize the fiber cell
//! 4. voxelize the woven unit cell
//! 5. merge voxel mesh, orientations and yarn conductivity into solver input
//! 6. homogenize the unit cell
//! 7. extract `k11` and `k33`
//!
//! A failing row is recorded and the batch moves on.

pub mod batch;
pub mod config;
pub mod error;
pub mod row;
pub mod stage;
pub mod tool;
pub mod workspace;

pub use batch::{Batch, BatchSummary, RowFailure};
pub use config::{BatchConfig, PipelineConfig, ToolsConfig};
pub use error::{BatchError, ConfigError, StageError, StageFailure, ToolError};
pub use row::{CancelToken, RowOutcome, RowPipeline};
pub use stage::Stage;
pub use tool::{Placeholders, ProcessRunner, ToolCommand, ToolInvocation, ToolRunner};
pub use workspace::RowWorkspace;
