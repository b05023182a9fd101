use thiserror::Error;

use crate::core::expression::ExpressionError;
use crate::core::utils::geometry::AlignmentError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Expression has {count} collective variables, more than the limit of {max}")]
    ArityExceeded { count: usize, max: usize },

    #[error("Particle index {index} is out of range for a system of {count} particles")]
    ParticleOutOfRange { index: usize, count: usize },

    #[error("Expected {expected} positions, got {found}")]
    PositionCount { expected: usize, found: usize },

    #[error("Bond has {found} particles, expected {expected}")]
    BondSize { expected: usize, found: usize },

    #[error("Force is not part of the system this context was initialized with")]
    NotBound,

    #[error("Context has no positions yet")]
    NotInitialized,

    #[error("System changed after the context was initialized; call reinitialize first")]
    Stale,

    #[error("Reference has {reference} points but the group has {group} particles")]
    ReferenceSize { reference: usize, group: usize },

    #[error("Force evaluated to a non-finite value ({0})")]
    NonFinite(f64),

    #[error("Expression error: {source}")]
    Expression {
        #[from]
        source: ExpressionError,
    },

    #[error("Alignment failed: {source}")]
    Alignment {
        #[from]
        source: AlignmentError,
    },
}
