//! Mesh builder for voxel-mesher decks.
//!
//! Walks the cards of a parsed deck with a section state machine: `*Node`
//! opens the node section, `*Element` the element section, a named `*ElSet`
//! an element-group block. Any other header closes whatever was open.

use std::path::Path;

use log::debug;
use wvh_inp::{Card, Deck, Record};

use crate::error::MeshError;
use crate::mesh::{Element, Mesh, Node};
use crate::sets::ElementGroup;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Nodes,
    Elements,
    Group,
}

/// Builds a mesh from a parsed deck
pub struct MeshBuilder {
    mesh: Mesh,
    source: String,
    skipped_elements: usize,
}

impl MeshBuilder {
    /// `source` names the deck in error messages
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            mesh: Mesh::new(),
            source: source.into(),
            skipped_elements: 0,
        }
    }

    /// Build a mesh from the given deck
    pub fn build_from_deck(deck: &Deck, source: impl Into<String>) -> Result<Mesh, MeshError> {
        let mut builder = Self::new(source);
        builder.process_deck(deck)?;
        Ok(builder.mesh)
    }

    fn process_deck(&mut self, deck: &Deck) -> Result<(), MeshError> {
        for card in &deck.cards {
            match section_of(card) {
                Section::Nodes => self.process_node_card(card)?,
                Section::Elements => self.process_element_card(card)?,
                Section::Group => self.process_group_card(card),
                Section::None => {}
            }
        }

        self.mesh.apply_group_materials();
        self.mesh.validate()?;

        debug!(
            "{}: {} nodes, {} elements, {} groups ({} non-element records skipped)",
            self.source,
            self.mesh.nodes().len(),
            self.mesh.elements().len(),
            self.mesh.groups().len(),
            self.skipped_elements
        );
        Ok(())
    }

    /// Process a *Node card: id, x, y, z, extra fields ignored
    fn process_node_card(&mut self, card: &Card) -> Result<(), MeshError> {
        for record in &card.records {
            let fields: Vec<&str> = record.fields().collect();
            if fields.len() < 4 {
                return Err(self.record_error(
                    record,
                    format!(
                        "node record needs id, x, y, z (found {} fields)",
                        fields.len()
                    ),
                ));
            }

            let id = fields[0].parse::<i64>().map_err(|_| {
                self.record_error(record, format!("invalid node id '{}'", fields[0]))
            })?;

            let mut coords = [0.0f64; 3];
            for (axis, (slot, raw)) in coords.iter_mut().zip(&fields[1..4]).enumerate() {
                *slot = raw.parse::<f64>().map_err(|_| {
                    self.record_error(
                        record,
                        format!("invalid {} coordinate for node {id}: '{raw}'", axis_name(axis)),
                    )
                })?;
            }

            self.mesh
                .add_node(Node::new(id, coords[0], coords[1], coords[2]))
                .map_err(|err| self.record_error(record, err.to_string()))?;
        }

        Ok(())
    }

    /// Process an *Element card.
    ///
    /// Records whose first field is not an integer are skipped; mesher
    /// output can carry decorative rows inside the element section.
    fn process_element_card(&mut self, card: &Card) -> Result<(), MeshError> {
        for record in &card.records {
            let mut fields = record.fields();
            let Some(id) = fields.next().and_then(|f| f.parse::<i64>().ok()) else {
                self.skipped_elements += 1;
                continue;
            };

            let mut nodes = Vec::with_capacity(8);
            for raw in fields {
                let node = raw.parse::<i64>().map_err(|_| {
                    self.record_error(
                        record,
                        format!("invalid node reference '{raw}' in element {id}"),
                    )
                })?;
                nodes.push(node);
            }

            if nodes.is_empty() {
                return Err(self.record_error(
                    record,
                    format!("element {id} has no node references"),
                ));
            }

            self.mesh
                .add_element(Element::new(id, nodes))
                .map_err(|err| self.record_error(record, err.to_string()))?;
        }

        Ok(())
    }

    /// Process a named *ElSet card; non-integer tokens are ignored
    fn process_group_card(&mut self, card: &Card) {
        let Some(name) = card.parameter("ELSET") else {
            return;
        };

        let members = card
            .records
            .iter()
            .flat_map(|record| record.fields())
            .filter_map(|field| field.parse::<i64>().ok())
            .collect();

        self.mesh.add_group(ElementGroup::new(name, members));
    }

    fn record_error(&self, record: &Record, message: impl Into<String>) -> MeshError {
        MeshError::parse(&self.source, record.line, message)
    }
}

/// Parse a mesh from deck text
pub fn parse_mesh_str(raw: &str, source: &str) -> Result<Mesh, MeshError> {
    let deck = Deck::parse_str(raw).map_err(|err| MeshError::parse(source, err.line, err.message))?;
    MeshBuilder::build_from_deck(&deck, source)
}

/// Parse a mesh from a deck file
pub fn parse_mesh_file(path: impl AsRef<Path>) -> Result<Mesh, MeshError> {
    let path = path.as_ref();
    let source = path.display().to_string();
    let deck =
        Deck::parse_file(path).map_err(|err| MeshError::parse(&source, err.line, err.message))?;
    MeshBuilder::build_from_deck(&deck, source)
}

fn section_of(card: &Card) -> Section {
    if card.is("NODE") {
        Section::Nodes
    } else if card.is("ELEMENT") {
        Section::Elements
    } else if card.is("ELSET") {
        if card.parameter("ELSET").is_some_and(|name| !name.is_empty()) {
            Section::Group
        } else {
            Section::None
        }
    } else {
        Section::None
    }
}

fn axis_name(axis: usize) -> &'static str {
    match axis {
        0 => "x",
        1 => "y",
        _ => "z",
    }
}
