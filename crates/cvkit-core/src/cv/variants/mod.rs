//! Concrete collective variables other than the alignment-based content family.

pub mod angle;
pub mod distance;
pub mod helix_torsion_content;
pub mod number_of_contacts;
pub mod radius_of_gyration;
pub mod rmsd;
pub mod torsion;
pub mod torsion_similarity;

use super::error::CvError;
use crate::core::expression::{Expression, ExpressionError, parse};
use crate::core::models::residue::Residue;
use crate::engine::force::{CompoundBondForce, Force, Primitive};
use std::sync::Arc;

pub(crate) fn check_index(
    argument: &'static str,
    index: usize,
    num_atoms: usize,
) -> Result<(), CvError> {
    if index >= num_atoms {
        return Err(CvError::invalid(
            argument,
            format!("atom index {index} is out of range for {num_atoms} atoms"),
        ));
    }
    Ok(())
}

/// Particle index of a named atom, or the error naming the atom and residue.
pub(crate) fn residue_atom(residue: &Residue, atom: &str) -> Result<usize, CvError> {
    residue
        .atom_index(atom)
        .ok_or_else(|| CvError::MissingAtom {
            atom: atom.to_string(),
            residue: residue.label(),
        })
}

/// Parses a switching function of the placeholder `x`.
pub(crate) fn parse_step_function(text: &str) -> Result<Expression, CvError> {
    let expression = parse(text)?;
    if let Some(other) = expression.variables().into_iter().find(|var| var != "x") {
        return Err(ExpressionError::UnknownVariable(other).into());
    }
    Ok(expression)
}

/// A compound-bond force with one bond per particle tuple.
pub(crate) fn bond_force(
    particles_per_bond: usize,
    energy: Expression,
    primitives: Vec<(&str, Primitive)>,
    bonds: impl IntoIterator<Item = Vec<usize>>,
    pbc: bool,
) -> Result<Arc<Force>, CvError> {
    let primitives = primitives
        .into_iter()
        .map(|(name, primitive)| (name.to_string(), primitive))
        .collect();
    let mut force = CompoundBondForce::new(particles_per_bond, energy, primitives)?;
    for bond in bonds {
        force.add_bond(bond)?;
    }
    force.set_uses_periodic_boundary_conditions(pbc);
    Ok(Arc::new(force.into()))
}
