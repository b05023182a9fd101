//! # Core Module
//!
//! Stateless foundations shared by the engine and the collective-variable layer.
//!
//! - **Units** ([`units`]) - Unit descriptors anchored to the canonical MD unit system
//! - **Structure** ([`models`]) - Residues and topologies that map atom names to particle indices
//! - **Geometry** ([`utils`]) - Optimal rigid-body alignment (Kabsch) and geometric primitives
//!   with analytic gradients
//! - **Expressions** ([`expression`]) - The symbolic scalar language used to combine terms
//! - **Reference data** ([`references`]) - Ideal secondary-structure geometries, loaded once
//!   per process and shared read-only

pub mod expression;
pub mod models;
pub mod references;
pub mod units;
pub mod utils;
