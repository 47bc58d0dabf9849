//! Per-element fiber orientation records (`.ori` files).
//!
//! The voxel mesher writes one line per yarn element: the element id followed
//! by two direction vectors. The format has no strict header, so any line that
//! does not look like a record is skipped rather than rejected.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use log::debug;
use nalgebra::Vector3;

/// Orientation of one element: two direction vectors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationRecord {
    pub element_id: i64,
    pub a: Vector3<f64>,
    pub b: Vector3<f64>,
}

impl OrientationRecord {
    /// The six components `a1 a2 a3 b1 b2 b3`
    pub fn components(&self) -> [f64; 6] {
        [self.a.x, self.a.y, self.a.z, self.b.x, self.b.y, self.b.z]
    }
}

/// Sparse element id → orientation mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrientationMap {
    records: HashMap<i64, OrientationRecord>,
}

impl OrientationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record; a later record for the same element replaces the earlier one
    pub fn insert(&mut self, record: OrientationRecord) {
        self.records.insert(record.element_id, record);
    }

    pub fn get(&self, element_id: i64) -> Option<&OrientationRecord> {
        self.records.get(&element_id)
    }

    /// Six components for an element, zeros when it has no record
    pub fn components_or_zero(&self, element_id: i64) -> [f64; 6] {
        self.get(element_id)
            .map(OrientationRecord::components)
            .unwrap_or([0.0; 6])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parse orientation text, skipping lines that are not records
pub fn parse_str(raw: &str) -> OrientationMap {
    let mut map = OrientationMap::new();
    let mut skipped = 0usize;

    for line in raw.lines() {
        match parse_line(line) {
            Some(record) => map.insert(record),
            None if !line.trim().is_empty() => skipped += 1,
            None => {}
        }
    }

    if skipped > 0 {
        debug!("orientation: {} records, {} lines skipped", map.len(), skipped);
    }
    map
}

/// Load an orientation file
pub fn load(path: impl AsRef<Path>) -> io::Result<OrientationMap> {
    let raw = fs::read_to_string(path)?;
    Ok(parse_str(&raw))
}

/// Load an orientation file; a missing file yields an empty mapping
pub fn load_optional(path: impl AsRef<Path>) -> io::Result<OrientationMap> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(raw) => Ok(parse_str(&raw)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(
                "orientation file {} not found, using zero orientation",
                path.display()
            );
            Ok(OrientationMap::new())
        }
        Err(err) => Err(err),
    }
}

fn parse_line(line: &str) -> Option<OrientationRecord> {
    let body = strip_comment_markers(line.trim());
    let tokens: Vec<&str> = body
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.len() < 7 {
        return None;
    }
    let id_token = tokens[0];
    if !id_token.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let element_id = id_token.parse::<i64>().ok()?;

    let mut values = [0.0f64; 6];
    for (slot, token) in values.iter_mut().zip(&tokens[1..7]) {
        *slot = token.parse::<f64>().ok()?;
    }

    Some(OrientationRecord {
        element_id,
        a: Vector3::new(values[0], values[1], values[2]),
        b: Vector3::new(values[3], values[4], values[5]),
    })
}

/// Strips any run of leading `#` / `*` markers and the whitespace around them
fn strip_comment_markers(mut line: &str) -> &str {
    while let Some(rest) = line.strip_prefix(['#', '*']) {
        line = rest.trim_start();
    }
    line
}
