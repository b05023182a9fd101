//! # Core Models Module
//!
//! Minimal structural description of the particles a collective variable selects.
//!
//! Collective variables never see force-field data; they only need to know which particle
//! index carries a given atom name inside a given residue. These models provide exactly that:
//!
//! - [`residue`] - A named, numbered residue mapping atom names to particle indices
//! - [`topology`] - Chains of residues stored in slot maps, plus a sequential builder
//! - [`ids`] - Stable identifiers for residues and chains
//!
//! ```ignore
//! use cvkit::core::models::topology::TopologyBuilder;
//!
//! let mut builder = TopologyBuilder::new();
//! builder.start_chain('A').start_residue(1, "GLY");
//! let n = builder.add_atom("N");
//! let topology = builder.build();
//! ```

pub mod ids;
pub mod residue;
pub mod topology;
