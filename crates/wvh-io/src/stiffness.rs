//! Effective stiffness extraction from homogenization solver output (`*.sc.k`).
//!
//! The solver prints an "Effective Stiffness Matrix" block of three rows,
//! usually followed by an "Effective Compliance Matrix" block. Rows may carry
//! labels or inline comments; only tokens that parse as numbers are kept.

use std::fs;
use std::path::Path;

use nalgebra::Matrix3;
use thiserror::Error;

const STIFFNESS_MARKER: &str = "effective stiffness matrix";
const COMPLIANCE_MARKER: &str = "effective compliance matrix";

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("no \"Effective Stiffness Matrix\" block in solver output")]
    MarkerNotFound,

    #[error("incomplete stiffness matrix: found {rows} of 3 rows")]
    IncompleteMatrix { rows: usize },

    #[error("stiffness row {row} has {columns} values, no diagonal entry")]
    MissingDiagonal { row: usize, columns: usize },

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Diagonal of the effective conductivity/stiffness tensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StiffnessDiagonal {
    pub k11: f64,
    pub k22: f64,
    pub k33: f64,
}

/// The three rows collected after the stiffness marker
#[derive(Debug, Clone, PartialEq)]
pub struct StiffnessTensor {
    rows: Vec<Vec<f64>>,
}

impl StiffnessTensor {
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn diagonal(&self) -> Result<StiffnessDiagonal, ExtractionError> {
        let entry = |i: usize| {
            self.rows[i]
                .get(i)
                .copied()
                .ok_or(ExtractionError::MissingDiagonal {
                    row: i + 1,
                    columns: self.rows[i].len(),
                })
        };
        Ok(StiffnessDiagonal {
            k11: entry(0)?,
            k22: entry(1)?,
            k33: entry(2)?,
        })
    }

    /// Full 3×3 matrix, when every row has exactly three values
    pub fn as_matrix(&self) -> Option<Matrix3<f64>> {
        if self.rows.iter().any(|row| row.len() != 3) {
            return None;
        }
        Some(Matrix3::from_fn(|r, c| self.rows[r][c]))
    }
}

/// Collect the stiffness rows from solver output text
pub fn parse_tensor(raw: &str) -> Result<StiffnessTensor, ExtractionError> {
    let mut lines = raw.lines();
    if !lines
        .by_ref()
        .any(|line| line.to_ascii_lowercase().contains(STIFFNESS_MARKER))
    {
        return Err(ExtractionError::MarkerNotFound);
    }

    let mut rows: Vec<Vec<f64>> = Vec::with_capacity(3);
    for line in lines {
        if line.to_ascii_lowercase().contains(COMPLIANCE_MARKER) {
            break;
        }
        let values: Vec<f64> = line
            .split_whitespace()
            .filter_map(|token| token.parse::<f64>().ok())
            .collect();
        if values.is_empty() {
            continue;
        }
        rows.push(values);
        if rows.len() == 3 {
            break;
        }
    }

    if rows.len() != 3 {
        return Err(ExtractionError::IncompleteMatrix { rows: rows.len() });
    }
    Ok(StiffnessTensor { rows })
}

/// Extract `(k11, k22, k33)` from solver output text
pub fn extract_str(raw: &str) -> Result<StiffnessDiagonal, ExtractionError> {
    parse_tensor(raw)?.diagonal()
}

/// Extract `(k11, k22, k33)` from a solver output file
pub fn extract_file(path: impl AsRef<Path>) -> Result<StiffnessDiagonal, ExtractionError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| ExtractionError::Read {
        path: path.display().to_string(),
        source,
    })?;
    extract_str(&raw)
}
