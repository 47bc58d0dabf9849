//! Constituent material constants shared by the geometry and solver-input writers.

use serde::{Deserialize, Serialize};

/// Conductivities and homogenized volumes used across the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MaterialConstants {
    /// Orthotropic fiber conductivity `k11 k22 k33` for the fiber-cell solve
    pub fiber_conductivity: [f64; 3],
    /// Isotropic matrix conductivity
    pub matrix_conductivity: f64,
    /// Homogenized volume of the 2-D hexagonal fiber cell
    pub cell_volume: f64,
    /// Homogenized volume of the woven unit cell
    pub weave_volume: f64,
}

impl Default for MaterialConstants {
    fn default() -> Self {
        Self {
            fiber_conductivity: [10.2, 1.256, 1.256],
            matrix_conductivity: 0.180,
            cell_volume: 1.732,
            weave_volume: 0.44,
        }
    }
}
