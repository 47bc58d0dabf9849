//! Element groups and the material phases they select.

/// Constituent phase of a woven composite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialPhase {
    /// Fiber tow
    Yarn,
    /// Surrounding resin
    Matrix,
}

impl MaterialPhase {
    /// Material id written to solver input
    pub fn id(self) -> u32 {
        match self {
            MaterialPhase::Yarn => 1,
            MaterialPhase::Matrix => 2,
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            1 => Some(MaterialPhase::Yarn),
            2 => Some(MaterialPhase::Matrix),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MaterialPhase::Yarn => "yarn",
            MaterialPhase::Matrix => "matrix",
        }
    }

    /// Phase selected by a group name: "yarn" is checked before "matrix",
    /// both as case-insensitive substrings.
    pub fn classify(group_name: &str) -> Option<Self> {
        let lower = group_name.to_ascii_lowercase();
        if lower.contains("yarn") {
            Some(MaterialPhase::Yarn)
        } else if lower.contains("matrix") {
            Some(MaterialPhase::Matrix)
        } else {
            None
        }
    }
}

/// A named set of elements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementGroup {
    pub name: String,
    /// Member element ids, in source order
    pub members: Vec<i64>,
}

impl ElementGroup {
    pub fn new(name: impl Into<String>, members: Vec<i64>) -> Self {
        Self {
            name: name.into(),
            members,
        }
    }

    pub fn phase(&self) -> Option<MaterialPhase> {
        MaterialPhase::classify(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_substring() {
        assert_eq!(MaterialPhase::classify("Yarn0"), Some(MaterialPhase::Yarn));
        assert_eq!(MaterialPhase::classify("ALLYARNS"), Some(MaterialPhase::Yarn));
        assert_eq!(MaterialPhase::classify("Matrix"), Some(MaterialPhase::Matrix));
        assert_eq!(MaterialPhase::classify("Surface"), None);
    }

    #[test]
    fn yarn_keyword_takes_precedence_within_one_name() {
        assert_eq!(
            MaterialPhase::classify("YarnInMatrix"),
            Some(MaterialPhase::Yarn)
        );
    }

    #[test]
    fn ids_round_trip() {
        for phase in [MaterialPhase::Yarn, MaterialPhase::Matrix] {
            assert_eq!(MaterialPhase::from_id(phase.id()), Some(phase));
        }
        assert_eq!(MaterialPhase::from_id(7), None);
    }
}
