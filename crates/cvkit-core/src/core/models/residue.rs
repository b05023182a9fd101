use serde::{Deserialize, Serialize};
use std::fmt;

/// An atom name bound to the index of the particle that carries it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AtomRef {
    pub name: String,
    pub index: usize,
}

/// A residue as seen by collective variables: its name, its sequence number, and the
/// particle index of every named atom it contains.
///
/// Residues are self-contained so that a collective variable built from them can be
/// serialized and rebuilt without access to the topology they came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Residue {
    pub name: String,  // Residue name (e.g., "ALA", "GLY")
    pub number: isize, // Residue sequence number from source
    atoms: Vec<AtomRef>,
}

impl Residue {
    pub fn new(name: &str, number: isize) -> Self {
        Self {
            name: name.to_string(),
            number,
            atoms: Vec::new(),
        }
    }

    pub fn with_atoms<'a>(
        name: &str,
        number: isize,
        atoms: impl IntoIterator<Item = (&'a str, usize)>,
    ) -> Self {
        let mut residue = Self::new(name, number);
        for (atom_name, index) in atoms {
            residue.add_atom(atom_name, index);
        }
        residue
    }

    /// Adds an atom, replacing the index of an existing atom with the same name.
    pub fn add_atom(&mut self, name: &str, index: usize) {
        match self.atoms.iter_mut().find(|atom| atom.name == name) {
            Some(existing) => existing.index = index,
            None => self.atoms.push(AtomRef {
                name: name.to_string(),
                index,
            }),
        }
    }

    pub fn atoms(&self) -> &[AtomRef] {
        &self.atoms
    }

    pub fn atom_index(&self, name: &str) -> Option<usize> {
        self.atoms
            .iter()
            .find(|atom| atom.name == name)
            .map(|atom| atom.index)
    }

    pub fn is_glycine(&self) -> bool {
        self.name == "GLY"
    }

    /// Label used in diagnostics, e.g. `GLY12`.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Residue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_residue_has_no_atoms() {
        let residue = Residue::new("ALA", 3);
        assert_eq!(residue.name, "ALA");
        assert_eq!(residue.number, 3);
        assert!(residue.atoms().is_empty());
        assert_eq!(residue.atom_index("CA"), None);
    }

    #[test]
    fn atoms_keep_insertion_order() {
        let residue = Residue::with_atoms("SER", 7, [("N", 10), ("CA", 11), ("C", 12)]);
        let names: Vec<_> = residue.atoms().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["N", "CA", "C"]);
        assert_eq!(residue.atom_index("CA"), Some(11));
    }

    #[test]
    fn adding_duplicate_name_replaces_index() {
        let mut residue = Residue::new("THR", 1);
        residue.add_atom("OG1", 4);
        residue.add_atom("OG1", 9);
        assert_eq!(residue.atoms().len(), 1);
        assert_eq!(residue.atom_index("OG1"), Some(9));
    }

    #[test]
    fn label_joins_name_and_number() {
        assert_eq!(Residue::new("GLY", 12).label(), "GLY12");
        assert_eq!(Residue::new("TMP", -1).to_string(), "TMP-1");
    }

    #[test]
    fn glycine_is_detected_by_name() {
        assert!(Residue::new("GLY", 1).is_glycine());
        assert!(!Residue::new("ALA", 1).is_glycine());
    }
}
