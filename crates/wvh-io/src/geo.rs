//! Gmsh `.geo` synthesis for the hexagonal fiber/matrix cell.
//!
//! The cell is a 1 × √3 rectangle with quarter fibers at the four corners and
//! a full fiber at the center. The fiber radius follows from the requested
//! fiber volume fraction of a hexagonal packing.

use std::f64::consts::PI;

use thiserror::Error;

use crate::materials::MaterialConstants;

const HALF_HEIGHT: f64 = 0.866025;
const MESH_SIZE: f64 = 0.1;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("{name} must lie in (0, 1), got {value}")]
    OutOfRange { name: &'static str, value: f64 },

    #[error("fiber volume fraction {volume_fraction} gives radius {radius:.4}, fibers would overlap (radius must stay below 0.5)")]
    FiberOverlap { volume_fraction: f64, radius: f64 },
}

/// Check that a sampled ratio lies in the open unit interval
pub fn check_unit_interval(name: &'static str, value: f64) -> Result<(), GeometryError> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(GeometryError::OutOfRange { name, value })
    }
}

/// Fiber radius of a hexagonal packing with the given volume fraction
pub fn fiber_radius(volume_fraction: f64) -> Result<f64, GeometryError> {
    check_unit_interval("volume fraction", volume_fraction)?;
    let radius = (3f64.sqrt() * volume_fraction / (2.0 * PI)).sqrt();
    if radius >= 0.5 {
        return Err(GeometryError::FiberOverlap {
            volume_fraction,
            radius,
        });
    }
    Ok(radius)
}

/// Render the `.geo` script of the fiber cell
pub fn write_fiber_cell(
    volume_fraction: f64,
    materials: &MaterialConstants,
) -> Result<String, GeometryError> {
    let r = fiber_radius(volume_fraction)?;
    let half_sqrt3 = 3f64.sqrt() / 2.0;
    let top_inner = half_sqrt3 - r;
    let bottom_inner = -half_sqrt3 + r;
    let [k11, k22, k33] = materials.fiber_conductivity;
    let h = HALF_HEIGHT;
    let lc = MESH_SIZE;

    let mut geo = String::new();
    let mut line = |text: String| {
        geo.push_str(&text);
        geo.push('\n');
    };

    line(format!("// fiber cell, radius {r:.6}"));
    line("// ##1, orthotropic material".into());
    line("// Material name: 1 -- fiber".into());
    line(format!("Physical Point(\"1 1 1 0 0 {k11} {k22} {k33}\") = {{}};"));
    line(String::new());
    line("// ##2, isotropic material".into());
    line("// Material name: 2 -- matrix".into());
    line(format!(
        "Physical Point(\"2 0 1 0 0 {:.3}\") = {{}};",
        materials.matrix_conductivity
    ));
    line(String::new());
    line(format!("// volume fraction = {volume_fraction};"));
    line("l = 1;".into());
    line(String::new());

    let points: [(f64, f64); 17] = [
        (-0.5, h),
        (0.5, h),
        (0.5, -h),
        (-0.5, -h),
        (-0.5 + r, h),
        (-0.5, top_inner),
        (0.5 - r, h),
        (0.5, top_inner),
        (0.5, bottom_inner),
        (0.5 - r, -h),
        (-0.5 + r, -h),
        (-0.5, bottom_inner),
        (0.0, 0.0),
        (0.0, -r),
        (r, 0.0),
        (0.0, r),
        (-r, 0.0),
    ];
    for (i, (x, y)) in points.iter().enumerate() {
        line(format!("Point({}) = {{ {x}, {y}, 0, {lc} }};", i + 1));
    }
    line(String::new());

    let lines: [(u32, u32, u32); 12] = [
        (3, 2, 7),
        (4, 7, 5),
        (5, 5, 1),
        (6, 1, 6),
        (7, 6, 12),
        (8, 12, 4),
        (9, 4, 11),
        (10, 11, 10),
        (11, 10, 3),
        (12, 3, 9),
        (13, 9, 8),
        (14, 8, 2),
    ];
    for (id, a, b) in lines {
        line(format!("Line({id}) = {{ {a}, {b} }};"));
    }

    let arcs: [(u32, u32, u32, u32); 8] = [
        (15, 5, 1, 6),
        (16, 12, 4, 11),
        (17, 10, 3, 9),
        (18, 8, 2, 7),
        (19, 16, 13, 17),
        (20, 17, 13, 14),
        (21, 14, 13, 15),
        (22, 15, 13, 16),
    ];
    for (id, start, center, end) in arcs {
        line(format!("Circle({id}) = {{ {start}, {center}, {end} }};"));
    }
    line(String::new());

    let surfaces: [(u32, &str, u32, &str); 6] = [
        (23, "5, 6, -15", 24, "23"),
        (25, "3, -18, 14", 26, "25"),
        (27, "20, 21, 22, 19", 28, "27"),
        (29, "8, 9, -16", 30, "29"),
        (31, "11, 12, -17", 32, "31"),
        (33, "4, 15, 7, 16, 10, 17, 13, 18", 34, "33, 27"),
    ];
    for (loop_id, curves, surface_id, loops) in surfaces {
        line(format!("Line Loop({loop_id}) = {{ {curves} }};"));
        line(format!("Plane Surface({surface_id}) = {{ {loops} }};"));
    }
    line(String::new());

    line("Physical Surface(1) = { 24, 26, 28, 30, 32 };".into());
    line("Physical Surface(2) = { 34 };".into());
    line("Recombine Surface{ 24, 26, 28, 30, 32, 34 };".into());
    line(String::new());
    line("Mesh.Algorithm = 8;".into());
    line("Mesh.RecombineAll = 1;".into());
    line("Mesh.CharacteristicLengthFactor = 1;".into());

    Ok(geo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radius_matches_hexagonal_packing() {
        let r = fiber_radius(0.5).expect("valid fraction");
        let vf_back = 2.0 * PI * r * r / 3f64.sqrt();
        assert!((vf_back - 0.5).abs() < 1e-12);
    }

    #[test]
    fn rejects_fractions_outside_unit_interval() {
        assert!(matches!(
            fiber_radius(0.0),
            Err(GeometryError::OutOfRange { .. })
        ));
        assert!(matches!(
            fiber_radius(1.2),
            Err(GeometryError::OutOfRange { .. })
        ));
        assert!(fiber_radius(f64::NAN).is_err());
    }

    #[test]
    fn rejects_overlapping_fibers() {
        // radius reaches 0.5 at vf = π / (2√3) ≈ 0.9069
        assert!(fiber_radius(0.90).is_ok());
        assert!(matches!(
            fiber_radius(0.95),
            Err(GeometryError::FiberOverlap { .. })
        ));
    }

    #[test]
    fn script_declares_all_entities() {
        let geo = write_fiber_cell(0.4, &MaterialConstants::default()).expect("script");
        assert!(geo.contains("Physical Point(\"1 1 1 0 0 10.2 1.256 1.256\") = {};"));
        assert!(geo.contains("Physical Point(\"2 0 1 0 0 0.180\") = {};"));
        assert_eq!(geo.matches("Point(").count() - 2, 17);
        assert_eq!(geo.matches("\nLine(").count(), 12);
        assert_eq!(geo.matches("Circle(").count(), 8);
        assert!(geo.contains("Plane Surface(34) = { 33, 27 };"));
        assert!(geo.contains("Physical Surface(2) = { 34 };"));
    }

    #[test]
    fn script_opens_with_radius_comment() {
        let r = fiber_radius(0.5).expect("valid fraction");
        let geo = write_fiber_cell(0.5, &MaterialConstants::default()).expect("script");
        let first = geo.lines().next().expect("non-empty script");
        assert_eq!(first, format!("// fiber cell, radius {r:.6}"));
        assert_eq!(geo.matches("fiber cell, radius").count(), 1);
        assert!(geo.ends_with("Mesh.CharacteristicLengthFactor = 1;\n"));
    }

    #[test]
    fn center_fiber_points_use_radius() {
        let r = fiber_radius(0.3).expect("valid fraction");
        let geo = write_fiber_cell(0.3, &MaterialConstants::default()).expect("script");
        assert!(geo.contains(&format!("Point(15) = {{ {r}, 0, 0, 0.1 }};")));
        assert!(geo.contains(&format!("Point(16) = {{ 0, {r}, 0, 0.1 }};")));
    }

    #[test]
    fn unit_interval_check_names_the_parameter() {
        let err = check_unit_interval("width ratio", 1.0).expect_err("1.0 is excluded");
        assert!(err.to_string().contains("width ratio"));
    }
}
