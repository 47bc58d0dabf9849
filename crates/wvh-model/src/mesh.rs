//! Mesh data structures for voxel meshes.
//!
//! Nodes and elements keep their declaration order, because the solver input
//! writers emit records in the order the mesher produced them. Lookups by id
//! go through side indices.

use std::collections::{BTreeMap, HashMap};

use crate::error::MeshError;
use crate::sets::{ElementGroup, MaterialPhase};

/// A node in the mesh
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Node ID as written by the mesher (unique, not necessarily contiguous)
    pub id: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Node {
    pub fn new(id: i64, x: f64, y: f64, z: f64) -> Self {
        Self { id, x, y, z }
    }

    pub fn coords(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// Element shape, classified from the number of node references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementShape {
    /// 3-node triangle
    Tri3,
    /// 4-node quadrilateral
    Quad4,
    /// 8-node hexahedron (voxel)
    Hex8,
    /// Anything else; rejected by the solver input writers
    Other(usize),
}

impl ElementShape {
    pub fn from_node_count(count: usize) -> Self {
        match count {
            3 => ElementShape::Tri3,
            4 => ElementShape::Quad4,
            8 => ElementShape::Hex8,
            n => ElementShape::Other(n),
        }
    }

    pub fn num_nodes(&self) -> usize {
        match self {
            ElementShape::Tri3 => 3,
            ElementShape::Quad4 => 4,
            ElementShape::Hex8 => 8,
            ElementShape::Other(n) => *n,
        }
    }

    pub fn label(&self) -> String {
        match self {
            ElementShape::Other(n) => format!("{n}-node"),
            shape => format!("{shape:?}"),
        }
    }
}

/// An element in the mesh
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: i64,
    /// Node connectivity in mesher order
    pub nodes: Vec<i64>,
    /// Material id; matrix unless an element group says otherwise
    pub material_id: u32,
}

impl Element {
    pub fn new(id: i64, nodes: Vec<i64>) -> Self {
        Self {
            id,
            nodes,
            material_id: MaterialPhase::Matrix.id(),
        }
    }

    pub fn shape(&self) -> ElementShape {
        ElementShape::from_node_count(self.nodes.len())
    }
}

/// Complete mesh with named element groups
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    nodes: Vec<Node>,
    elements: Vec<Element>,
    groups: Vec<ElementGroup>,
    node_index: HashMap<i64, usize>,
    element_index: HashMap<i64, usize>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node; ids must be unique
    pub fn add_node(&mut self, node: Node) -> Result<(), MeshError> {
        if self.node_index.contains_key(&node.id) {
            return Err(MeshError::DuplicateNode { id: node.id });
        }
        self.node_index.insert(node.id, self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    /// Add an element; ids must be unique
    pub fn add_element(&mut self, element: Element) -> Result<(), MeshError> {
        if self.element_index.contains_key(&element.id) {
            return Err(MeshError::DuplicateElement { id: element.id });
        }
        self.element_index.insert(element.id, self.elements.len());
        self.elements.push(element);
        Ok(())
    }

    pub fn add_group(&mut self, group: ElementGroup) {
        self.groups.push(group);
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Groups in declaration order
    pub fn groups(&self) -> &[ElementGroup] {
        &self.groups
    }

    pub fn get_node(&self, id: i64) -> Option<&Node> {
        self.node_index.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn get_element(&self, id: i64) -> Option<&Element> {
        self.element_index.get(&id).map(|&i| &self.elements[i])
    }

    pub fn get_element_mut(&mut self, id: i64) -> Option<&mut Element> {
        let index = *self.element_index.get(&id)?;
        Some(&mut self.elements[index])
    }

    /// Assign material ids from the element groups.
    ///
    /// Groups are applied in declaration order, so an element listed in both
    /// a yarn and a matrix group ends up with the phase of the later group.
    /// Members that are not elements of this mesh are ignored.
    pub fn apply_group_materials(&mut self) {
        let assignments: Vec<(u32, Vec<i64>)> = self
            .groups
            .iter()
            .filter_map(|group| {
                MaterialPhase::classify(&group.name).map(|phase| (phase.id(), group.members.clone()))
            })
            .collect();

        for (material_id, members) in assignments {
            for member in members {
                if let Some(element) = self.get_element_mut(member) {
                    element.material_id = material_id;
                }
            }
        }
    }

    /// Check that every element references existing nodes
    pub fn validate(&self) -> Result<(), MeshError> {
        for element in &self.elements {
            for &node_id in &element.nodes {
                if !self.node_index.contains_key(&node_id) {
                    return Err(MeshError::DanglingNode {
                        element: element.id,
                        node: node_id,
                    });
                }
            }
        }
        Ok(())
    }

    /// Rectangular voxel meshes only ever contain 8-node hexahedra
    pub fn ensure_hexahedral(&self) -> Result<(), MeshError> {
        match self
            .elements
            .iter()
            .find(|e| e.shape() != ElementShape::Hex8)
        {
            Some(element) => Err(MeshError::NotHexahedral {
                element: element.id,
                nodes: element.nodes.len(),
            }),
            None => Ok(()),
        }
    }

    pub fn statistics(&self) -> MeshStatistics {
        let mut shape_counts = BTreeMap::new();
        let mut material_counts = BTreeMap::new();
        for element in &self.elements {
            *shape_counts.entry(element.shape()).or_insert(0) += 1;
            *material_counts.entry(element.material_id).or_insert(0) += 1;
        }

        MeshStatistics {
            num_nodes: self.nodes.len(),
            num_elements: self.elements.len(),
            num_groups: self.groups.len(),
            shape_counts,
            material_counts,
        }
    }
}

/// Mesh statistics for reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshStatistics {
    pub num_nodes: usize,
    pub num_elements: usize,
    pub num_groups: usize,
    pub shape_counts: BTreeMap<ElementShape, usize>,
    pub material_counts: BTreeMap<u32, usize>,
}

impl MeshStatistics {
    /// Format as a human-readable string
    pub fn format(&self) -> String {
        let mut lines = vec![
            format!("Nodes: {}", self.num_nodes),
            format!("Elements: {}", self.num_elements),
            format!("Element groups: {}", self.num_groups),
        ];

        if !self.shape_counts.is_empty() {
            lines.push("Element shapes:".to_string());
            for (shape, count) in &self.shape_counts {
                lines.push(format!("  {}: {}", shape.label(), count));
            }
        }
        if !self.material_counts.is_empty() {
            lines.push("Materials:".to_string());
            for (material, count) in &self.material_counts {
                let name = MaterialPhase::from_id(*material)
                    .map(|p| p.name())
                    .unwrap_or("unknown");
                lines.push(format!("  {material} ({name}): {count}"));
            }
        }

        lines.join("\n")
    }
}
