use std::fmt;

/// Steps of one row, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Write the fiber-cell `.geo` script
    GeometrySynthesis,
    /// Mesh the fiber cell with the external mesher
    ExternalMesh,
    /// Homogenize the fiber cell
    FirstSolve,
    /// Voxelize the woven unit cell
    Voxelize,
    /// Convert the voxel mesh into weave solver input
    Merge,
    /// Homogenize the woven unit cell
    SecondSolve,
    /// Read the effective conductivities
    Extract,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::GeometrySynthesis,
        Stage::ExternalMesh,
        Stage::FirstSolve,
        Stage::Voxelize,
        Stage::Merge,
        Stage::SecondSolve,
        Stage::Extract,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::GeometrySynthesis => "geometry-synthesis",
            Stage::ExternalMesh => "external-mesh",
            Stage::FirstSolve => "first-solve",
            Stage::Voxelize => "voxelize",
            Stage::Merge => "merge",
            Stage::SecondSolve => "second-solve",
            Stage::Extract => "extract",
        }
    }

    /// Whether the stage runs an external tool
    pub fn is_external(self) -> bool {
        matches!(
            self,
            Stage::ExternalMesh | Stage::FirstSolve | Stage::Voxelize | Stage::SecondSolve
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_listed_in_execution_order() {
        let mut sorted = Stage::ALL;
        sorted.sort();
        assert_eq!(sorted, Stage::ALL);
        assert_eq!(Stage::ALL.iter().filter(|s| s.is_external()).count(), 4);
    }

    #[test]
    fn display_uses_log_names() {
        assert_eq!(Stage::SecondSolve.to_string(), "second-solve");
    }
}
