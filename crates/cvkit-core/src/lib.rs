//! # cvkit Core Library
//!
//! Composable, serializable collective variables: scalar functions of particle
//! coordinates that describe structural features such as distances, torsions, contact
//! counts, and alignment-based secondary-structure content.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture, each layer depending only on the
//! ones below it.
//!
//! - **[`core`]: The Foundation.** Stateless data and math: units, residue topologies,
//!   the Kabsch alignment kernel, the symbolic expression language, and the ideal
//!   reference geometries.
//!
//! - **[`engine`]: The Host.** A small force engine with systems, contexts, analytic
//!   gradients, and an arity limit on composite expressions, together with the generic
//!   reduction-tree builder that works around that limit.
//!
//! - **[`cv`]: The Public API.** The closed set of collective-variable variants behind
//!   one [`cv::CollectiveVariable`] type, their static argument schemas, the content
//!   assembler, and JSON Lines serialization.

pub mod core;
pub mod cv;
pub mod engine;
