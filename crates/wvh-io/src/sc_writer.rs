//! SwiftComp input (`.sc`) writers.
//!
//! Two documents are produced by the pipeline:
//!
//! - the **fiber cell** input: the 2-D hexagonal fiber/matrix cell meshed by
//!   Gmsh, homogenized first to obtain the yarn conductivity;
//! - the **weave** input: the 3-D voxel mesh of the woven unit cell, with the
//!   yarn conductivity taken from the first solve.
//!
//! The solver reads both positionally, so record order and the fixed field
//! counts per element line must be kept exactly.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use thiserror::Error;
use wvh_model::{ElementShape, Mesh};

use crate::materials::MaterialConstants;
use crate::orientation::OrientationMap;
use crate::stiffness::StiffnessDiagonal;

/// Trailing zero fields after the eight node ids of a weave element record
pub const CONNECTIVITY_PADDING: usize = 12;

/// Node slots of a fiber-cell element record (unused slots are zero)
pub const CELL_NODE_SLOTS: usize = 9;

#[derive(Error, Debug)]
pub enum SerializeError {
    #[error("element {element} has {found} node references, expected {expected}")]
    ElementShape {
        element: i64,
        found: usize,
        expected: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Write the weave solver input.
///
/// `orientation` is `Some` whenever an orientation block must be written;
/// an empty map still produces the block, with zeros for every element.
pub fn write_weave_input<W: Write>(
    out: &mut W,
    mesh: &Mesh,
    orientation: Option<&OrientationMap>,
    fiber: StiffnessDiagonal,
    materials: &MaterialConstants,
) -> Result<(), SerializeError> {
    for element in mesh.elements() {
        if element.shape() != ElementShape::Hex8 {
            return Err(SerializeError::ElementShape {
                element: element.id,
                found: element.nodes.len(),
                expected: "8".to_string(),
            });
        }
    }

    writeln!(out, "2 0 1 0 \t # Analysis_type  elem_type trans_flag temp_flag")?;
    writeln!(out)?;
    writeln!(
        out,
        "3 {} {} 2 0 0 \t # nSG nNode nElem nMat nSlave nLayer",
        mesh.nodes().len(),
        mesh.elements().len()
    )?;

    for node in mesh.nodes() {
        writeln!(out, "{} {} {} {}", node.id, node.x, node.y, node.z)?;
    }
    writeln!(out)?;

    let padding = vec!["0"; CONNECTIVITY_PADDING].join(" ");
    for element in mesh.elements() {
        write!(out, "{} {}", element.id, element.material_id)?;
        for node in &element.nodes {
            write!(out, " {node}")?;
        }
        writeln!(out, " {padding}")?;
    }
    writeln!(out)?;

    if let Some(orientation) = orientation {
        for element in mesh.elements() {
            match orientation.get(element.id) {
                Some(record) => {
                    let [a1, a2, a3, b1, b2, b3] = record.components();
                    writeln!(
                        out,
                        "{}  {}  {}  {}    {}  {}  {}  0 0 0",
                        element.id, a1, a2, a3, b1, b2, b3
                    )?;
                }
                None => writeln!(out, "{} 0 0 0 0 0 0 0 0 0", element.id)?,
            }
        }
        writeln!(out)?;
    }

    writeln!(out, "1 1 1 \t # mat_type isotropy ntemp (This is for fiber)")?;
    writeln!(out, "0 0 # T and Rho")?;
    writeln!(out, "{} {} {} # k11 k22 k33", fiber.k11, fiber.k22, fiber.k33)?;
    writeln!(out)?;

    writeln!(out, "2 0 1 \t # mat_type isotropy ntemp (This is for matrix)")?;
    writeln!(out, "0 0 # T and Rho")?;
    writeln!(out, "{:.3} # k", materials.matrix_conductivity)?;
    writeln!(out)?;

    write!(out, "{} \t #Homogenized SG Volume", materials.weave_volume)?;
    Ok(())
}

/// Render the weave solver input to a string
pub fn render_weave_input(
    mesh: &Mesh,
    orientation: Option<&OrientationMap>,
    fiber: StiffnessDiagonal,
    materials: &MaterialConstants,
) -> Result<String, SerializeError> {
    let mut buf = Vec::new();
    write_weave_input(&mut buf, mesh, orientation, fiber, materials)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Write the weave solver input to `path`; nothing is written on error
pub fn write_weave_input_file(
    path: impl AsRef<Path>,
    mesh: &Mesh,
    orientation: Option<&OrientationMap>,
    fiber: StiffnessDiagonal,
    materials: &MaterialConstants,
) -> Result<(), SerializeError> {
    let body = render_weave_input(mesh, orientation, fiber, materials)?;
    write_file(path.as_ref(), &body)
}

/// Write the 2-D fiber-cell solver input.
///
/// Triangles and quadrilaterals are padded with zero node references up to
/// [`CELL_NODE_SLOTS`]; the material id is the Gmsh physical tag.
pub fn write_cell_input<W: Write>(
    out: &mut W,
    mesh: &Mesh,
    materials: &MaterialConstants,
) -> Result<(), SerializeError> {
    for element in mesh.elements() {
        if !matches!(element.shape(), ElementShape::Tri3 | ElementShape::Quad4) {
            return Err(SerializeError::ElementShape {
                element: element.id,
                found: element.nodes.len(),
                expected: "3 or 4".to_string(),
            });
        }
    }

    writeln!(out, "2 0 0 0 \t # Analysis_type  elem_type trans_flag temp_flag")?;
    writeln!(out)?;
    writeln!(
        out,
        "2 {} {} 2 0 0 \t # nSG nNode nElem nMat nSlave nLayer",
        mesh.nodes().len(),
        mesh.elements().len()
    )?;
    writeln!(out)?;

    for node in mesh.nodes() {
        writeln!(out, "{} {} {} \t # node_no  x  y", node.id, node.x, node.y)?;
    }
    writeln!(out)?;

    for element in mesh.elements() {
        write!(out, "{} {}", element.id, element.material_id)?;
        for slot in 0..CELL_NODE_SLOTS {
            write!(out, " {}", element.nodes.get(slot).copied().unwrap_or(0))?;
        }
        writeln!(out, "\t # elem_no  mat_type  node1 node2  .... node 9")?;
    }
    writeln!(out)?;

    let [k11, k22, k33] = materials.fiber_conductivity;
    writeln!(out, "1 1 1 \t # mat_type isotropy ntemp (This if for fiber)")?;
    writeln!(out, "0 0 # T and Rho")?;
    writeln!(out, "{k11} {k22} {k33} # k11 k22 k33")?;
    writeln!(out)?;

    writeln!(out, "2 0 1 \t # mat_type isotropy ntemp (This if for matrix)")?;
    writeln!(out, "0 0 # T and Rho")?;
    writeln!(out, "{:.3} #k", materials.matrix_conductivity)?;
    writeln!(out)?;

    write!(out, "{} \t #Homogenized SG volume", materials.cell_volume)?;
    Ok(())
}

/// Render the fiber-cell solver input to a string
pub fn render_cell_input(
    mesh: &Mesh,
    materials: &MaterialConstants,
) -> Result<String, SerializeError> {
    let mut buf = Vec::new();
    write_cell_input(&mut buf, mesh, materials)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Write the fiber-cell solver input to `path`; nothing is written on error
pub fn write_cell_input_file(
    path: impl AsRef<Path>,
    mesh: &Mesh,
    materials: &MaterialConstants,
) -> Result<(), SerializeError> {
    let body = render_cell_input(mesh, materials)?;
    write_file(path.as_ref(), &body)
}

fn write_file(path: &Path, body: &str) -> Result<(), SerializeError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, body)?;
    Ok(())
}
