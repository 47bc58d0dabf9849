//! Error types for wvh-io

use thiserror::Error;

use crate::geo::GeometryError;
use crate::msh::MshError;
use crate::sc_writer::SerializeError;
use crate::stiffness::ExtractionError;
use crate::table::TableError;

pub type Result<T> = std::result::Result<T, IoError>;

#[derive(Error, Debug)]
pub enum IoError {
    #[error(transparent)]
    Mesh(#[from] wvh_model::MeshError),

    #[error(transparent)]
    Msh(#[from] MshError),

    #[error("stiffness extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("failed to write solver input: {0}")]
    Serialize(#[from] SerializeError),

    #[error("invalid geometry: {0}")]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
