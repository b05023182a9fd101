//! # Engine Module
//!
//! A compact host engine that evaluates collective-variable forces.
//!
//! Forces are symbolic energy expressions over geometric primitives, alignment RMSDs,
//! radii of gyration, and composite expressions over other forces. A [`system::System`]
//! collects particles and forces. A [`context::Context`] binds a system to coordinates
//! and answers value, gradient and effective-mass queries.
//!
//! Composite expressions accept at most [`force::MAX_COLLECTIVE_VARIABLES`] named
//! terms. Larger sums are split into a tree of smaller ones with
//! [`reduction::reduce_in_chunks`].

pub mod context;
pub mod error;
pub mod force;
pub mod reduction;
pub mod system;
