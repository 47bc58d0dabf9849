//! File formats of the woven-composite homogenization pipeline.
//!
//! This crate provides:
//! - **Orientation** reader for the voxelizer's per-element yarn directions
//! - **Stiffness extraction** from homogenization solver output (`*.sc.k`)
//! - **SwiftComp input** writers for the weave and the fiber cell
//! - **Gmsh** support: `.geo` synthesis and a 2.x `.msh` reader
//! - **Sample table** (CSV) with atomic rewrites
//! - **JSON run reports**

pub mod error;
pub mod geo;
pub mod materials;
pub mod msh;
pub mod orientation;
mod report;
pub mod sc_writer;
pub mod stiffness;
pub mod table;

pub use error::{IoError, Result};
pub use geo::{GeometryError, check_unit_interval, fiber_radius, write_fiber_cell};
pub use materials::MaterialConstants;
pub use msh::MshError;
pub use orientation::{OrientationMap, OrientationRecord};
pub use report::{RowReport, RowStatus, RunReport, load_report, save_report};
pub use sc_writer::{
    SerializeError, render_cell_input, render_weave_input, write_cell_input_file,
    write_weave_input_file,
};
pub use stiffness::{ExtractionError, StiffnessDiagonal, StiffnessTensor};
pub use table::{Sample, SampleTable, TableError};
