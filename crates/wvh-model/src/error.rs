//! Error types for wvh-model

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MeshError {
    #[error("{file}:{line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },

    #[error("duplicate node id {id}")]
    DuplicateNode { id: i64 },

    #[error("duplicate element id {id}")]
    DuplicateElement { id: i64 },

    #[error("element {element} references non-existent node {node}")]
    DanglingNode { element: i64, node: i64 },

    #[error("element {element} has {nodes} nodes, voxel meshes require 8-node hexahedra")]
    NotHexahedral { element: i64, nodes: usize },
}

impl MeshError {
    pub(crate) fn parse(file: &str, line: usize, message: impl Into<String>) -> Self {
        MeshError::Parse {
            file: file.to_string(),
            line,
            message: message.into(),
        }
    }
}
