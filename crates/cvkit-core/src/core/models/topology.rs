use super::ids::{ChainId, ResidueId};
use super::residue::Residue;
use slotmap::SlotMap;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    pub id: char,
    residues: Vec<ResidueId>,
}

impl Chain {
    fn new(id: char) -> Self {
        Self {
            id,
            residues: Vec::new(),
        }
    }

    pub fn residues(&self) -> &[ResidueId] {
        &self.residues
    }
}

/// Chains and residues of a particle system, with atoms identified by particle index.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    residues: SlotMap<ResidueId, Residue>,
    chains: SlotMap<ChainId, Chain>,
    /// Residues in insertion order across all chains.
    residue_order: Vec<ResidueId>,
    chain_id_map: HashMap<char, ChainId>,
    num_atoms: usize,
}

impl Topology {
    pub fn num_atoms(&self) -> usize {
        self.num_atoms
    }

    pub fn num_residues(&self) -> usize {
        self.residue_order.len()
    }

    pub fn residue(&self, id: ResidueId) -> Option<&Residue> {
        self.residues.get(id)
    }

    pub fn chain(&self, id: ChainId) -> Option<&Chain> {
        self.chains.get(id)
    }

    pub fn find_chain_by_id(&self, id: char) -> Option<ChainId> {
        self.chain_id_map.get(&id).copied()
    }

    /// Iterates over all residues in the order they were added.
    pub fn residues(&self) -> impl Iterator<Item = &Residue> {
        self.residue_order
            .iter()
            .filter_map(|&id| self.residues.get(id))
    }

    pub fn chain_residues(&self, id: char) -> Option<Vec<&Residue>> {
        let chain = self.chains.get(self.find_chain_by_id(id)?)?;
        Some(
            chain
                .residues
                .iter()
                .filter_map(|&rid| self.residues.get(rid))
                .collect(),
        )
    }

    pub fn find_residue(&self, chain: char, number: isize) -> Option<&Residue> {
        self.chain_residues(chain)?
            .into_iter()
            .find(|residue| residue.number == number)
    }
}

/// Builds a [`Topology`] residue by residue, handing out particle indices sequentially.
#[derive(Debug, Default)]
pub struct TopologyBuilder {
    topology: Topology,
    current_chain: Option<ChainId>,
    current_residue: Option<ResidueId>,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_chain(&mut self, id: char) -> &mut Self {
        let topology = &mut self.topology;
        let chain_id = *topology
            .chain_id_map
            .entry(id)
            .or_insert_with(|| topology.chains.insert(Chain::new(id)));
        self.current_chain = Some(chain_id);
        self.current_residue = None;
        self
    }

    /// Starts a new residue; a chain `'A'` is opened implicitly if none is active.
    pub fn start_residue(&mut self, number: isize, name: &str) -> &mut Self {
        let chain_id = match self.current_chain {
            Some(id) => id,
            None => {
                self.start_chain('A');
                self.current_chain.unwrap_or_default()
            }
        };
        let residue_id = self.topology.residues.insert(Residue::new(name, number));
        if let Some(chain) = self.topology.chains.get_mut(chain_id) {
            chain.residues.push(residue_id);
        }
        self.topology.residue_order.push(residue_id);
        self.current_residue = Some(residue_id);
        self
    }

    /// Adds a particle and returns its index. Atoms added before any residue is started
    /// are counted as particles but belong to no residue.
    pub fn add_atom(&mut self, name: &str) -> usize {
        let index = self.topology.num_atoms;
        self.topology.num_atoms += 1;
        if let Some(residue) = self
            .current_residue
            .and_then(|id| self.topology.residues.get_mut(id))
        {
            residue.add_atom(name, index);
        }
        index
    }

    pub fn build(self) -> Topology {
        self.topology
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_dipeptide() -> Topology {
        let mut builder = TopologyBuilder::new();
        builder.start_chain('A').start_residue(1, "ALA");
        for name in ["N", "CA", "CB", "C", "O"] {
            builder.add_atom(name);
        }
        builder.start_residue(2, "GLY");
        for name in ["N", "CA", "HA2", "C", "O"] {
            builder.add_atom(name);
        }
        builder.build()
    }

    #[test]
    fn builder_assigns_sequential_particle_indices() {
        let topology = build_dipeptide();
        assert_eq!(topology.num_atoms(), 10);
        assert_eq!(topology.num_residues(), 2);
        let residues: Vec<_> = topology.residues().collect();
        assert_eq!(residues[0].atom_index("N"), Some(0));
        assert_eq!(residues[1].atom_index("HA2"), Some(7));
    }

    #[test]
    fn residues_are_found_by_chain_and_number() {
        let topology = build_dipeptide();
        let gly = topology.find_residue('A', 2).unwrap();
        assert_eq!(gly.name, "GLY");
        assert!(topology.find_residue('A', 3).is_none());
        assert!(topology.find_residue('B', 1).is_none());
    }

    #[test]
    fn residue_without_explicit_chain_opens_default_chain() {
        let mut builder = TopologyBuilder::new();
        builder.start_residue(5, "LYS");
        builder.add_atom("N");
        let topology = builder.build();
        let chain = topology.chain_residues('A').unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].number, 5);
    }

    #[test]
    fn reopening_a_chain_appends_to_it() {
        let mut builder = TopologyBuilder::new();
        builder.start_chain('A').start_residue(1, "ALA");
        builder.start_chain('B').start_residue(1, "SER");
        builder.start_chain('A').start_residue(2, "VAL");
        let topology = builder.build();
        let chain_a = topology.chain_residues('A').unwrap();
        assert_eq!(chain_a.len(), 2);
        assert_eq!(chain_a[1].name, "VAL");
        let chain_id = topology.find_chain_by_id('B').unwrap();
        assert_eq!(topology.chain(chain_id).unwrap().residues().len(), 1);
    }
}
