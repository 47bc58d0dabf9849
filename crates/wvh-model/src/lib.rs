//! Mesh model for voxel meshes of woven composites.
//!
//! Turns a parsed keyword deck into nodes, 8-node hexahedral elements and
//! named element groups, and derives each element's material phase from the
//! names of the groups it belongs to.

mod error;
pub mod mesh;
pub mod mesh_builder;
pub mod sets;

pub use error::MeshError;
pub use mesh::{Element, ElementShape, Mesh, MeshStatistics, Node};
pub use mesh_builder::{MeshBuilder, parse_mesh_file, parse_mesh_str};
pub use sets::{ElementGroup, MaterialPhase};
