//! Gmsh 2.x ASCII mesh (`.msh`) reader for the fiber-cell mesh.
//!
//! Only the `$Nodes` and `$Elements` sections are read. Triangles (type 2)
//! and quadrangles (type 3) are kept with their physical tag as material id;
//! points and line elements on the cell boundary are dropped.

use std::fs;
use std::path::Path;

use log::debug;
use thiserror::Error;
use wvh_model::{Element, Mesh, Node};

const GMSH_TRIANGLE: u32 = 2;
const GMSH_QUADRANGLE: u32 = 3;

#[derive(Error, Debug)]
pub enum MshError {
    #[error("{file}:{line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },

    #[error("{file}: {message}")]
    Mesh { file: String, message: String },

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

struct Cursor<'a> {
    file: &'a str,
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn next_line(&mut self) -> Option<(usize, &'a str)> {
        let line = self.lines.get(self.pos)?;
        self.pos += 1;
        Some((self.pos, line.trim()))
    }

    fn expect_line(&mut self, what: &str) -> Result<(usize, &'a str), MshError> {
        let line_no = self.pos + 1;
        self.next_line()
            .ok_or_else(|| self.error(line_no, format!("unexpected end of file, expected {what}")))
    }

    fn expect_count(&mut self, section: &str) -> Result<usize, MshError> {
        let (line, text) = self.expect_line(&format!("{section} count"))?;
        text.parse::<usize>().map_err(|_| {
            self.error(
                line,
                format!("expected Gmsh 2.x {section} count, found '{text}'"),
            )
        })
    }

    fn error(&self, line: usize, message: impl Into<String>) -> MshError {
        MshError::Parse {
            file: self.file.to_string(),
            line,
            message: message.into(),
        }
    }
}

/// Parse Gmsh 2.x mesh text
pub fn parse_str(raw: &str, file: &str) -> Result<Mesh, MshError> {
    let mut cursor = Cursor {
        file,
        lines: raw.lines().collect(),
        pos: 0,
    };
    let mut mesh = Mesh::new();
    let mut dropped = 0usize;

    while let Some((_, text)) = cursor.next_line() {
        match text {
            "$MeshFormat" => {
                let (fmt_line, header) = cursor.expect_line("mesh format")?;
                let version = header.split_whitespace().next().unwrap_or_default();
                if !version.starts_with('2') {
                    return Err(cursor.error(
                        fmt_line,
                        format!("unsupported mesh format version {version}, export with -format msh2"),
                    ));
                }
            }
            "$Nodes" => {
                let count = cursor.expect_count("node")?;
                for _ in 0..count {
                    let (line, text) = cursor.expect_line("node record")?;
                    let node = parse_node(text).ok_or_else(|| {
                        cursor.error(line, format!("malformed node record '{text}'"))
                    })?;
                    mesh.add_node(node)
                        .map_err(|err| cursor.error(line, err.to_string()))?;
                }
            }
            "$Elements" => {
                let count = cursor.expect_count("element")?;
                for _ in 0..count {
                    let (line, text) = cursor.expect_line("element record")?;
                    match parse_element(text) {
                        Ok(Some(element)) => mesh
                            .add_element(element)
                            .map_err(|err| cursor.error(line, err.to_string()))?,
                        Ok(None) => dropped += 1,
                        Err(message) => return Err(cursor.error(line, message)),
                    }
                }
            }
            _ => {}
        }
    }

    mesh.validate().map_err(|err| MshError::Mesh {
        file: file.to_string(),
        message: err.to_string(),
    })?;

    debug!(
        "{file}: {} nodes, {} surface elements ({} lower-dimensional elements dropped)",
        mesh.nodes().len(),
        mesh.elements().len(),
        dropped
    );
    Ok(mesh)
}

/// Read a Gmsh 2.x mesh file
pub fn read_file(path: impl AsRef<Path>) -> Result<Mesh, MshError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| MshError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_str(&raw, &path.display().to_string())
}

fn parse_node(text: &str) -> Option<Node> {
    let mut fields = text.split_whitespace();
    let id = fields.next()?.parse::<i64>().ok()?;
    let x = fields.next()?.parse::<f64>().ok()?;
    let y = fields.next()?.parse::<f64>().ok()?;
    let z = fields.next()?.parse::<f64>().ok()?;
    Some(Node::new(id, x, y, z))
}

/// `id type ntags tag... node...`; `Ok(None)` for element types not kept
fn parse_element(text: &str) -> Result<Option<Element>, String> {
    let fields: Vec<&str> = text.split_whitespace().collect();
    let int = |i: usize| -> Result<i64, String> {
        let raw = fields
            .get(i)
            .ok_or_else(|| format!("element record '{text}' is truncated"))?;
        raw.parse::<i64>()
            .map_err(|_| format!("invalid integer '{raw}' in element record"))
    };

    let id = int(0)?;
    let element_type = int(1)?;
    let num_tags = usize::try_from(int(2)?).map_err(|_| format!("negative tag count in element {id}"))?;

    let num_nodes = match u32::try_from(element_type) {
        Ok(GMSH_TRIANGLE) => 3,
        Ok(GMSH_QUADRANGLE) => 4,
        _ => return Ok(None),
    };

    let physical = if num_tags > 0 { int(3)? } else { 0 };
    let first_node = 3 + num_tags;
    let nodes = (first_node..first_node + num_nodes)
        .map(int)
        .collect::<Result<Vec<_>, _>>()?;

    let mut element = Element::new(id, nodes);
    element.material_id = u32::try_from(physical)
        .map_err(|_| format!("invalid physical tag {physical} in element {id}"))?;
    Ok(Some(element))
}
