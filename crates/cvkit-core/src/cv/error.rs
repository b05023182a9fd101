use thiserror::Error;

use super::config::ConfigError;
use crate::core::expression::ExpressionError;
use crate::core::references::ReferenceError;
use crate::engine::error::EngineError;

#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("Unknown collective variable type '{0}'")]
    UnknownTag(String),

    #[error("Record of type '{tag}' is missing required argument '{argument}'")]
    MissingArgument { tag: String, argument: String },

    #[error("Argument '{argument}' of type '{tag}' has the wrong type")]
    TypeMismatch { tag: String, argument: String },

    #[error("Record of type '{tag}' has unexpected argument '{argument}'")]
    UnexpectedArgument { tag: String, argument: String },

    #[error("Malformed record: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("I/O error while streaming records: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Stream contains no record")]
    EmptyStream,
}

#[derive(Debug, Error)]
pub enum CvError {
    #[error("{residues} residues yield {blocks} blocks, which is not between 1 and 1024")]
    BlockCountOutOfRange { residues: usize, blocks: usize },

    #[error("{groups} groups is not between 1 and 1024")]
    GroupCountOutOfRange { groups: usize },

    #[error("The sum of block sizes ({sum}) must equal the number of residues ({residues})")]
    BlockSizeMismatch { sum: usize, residues: usize },

    #[error("Invalid argument '{argument}': {reason}")]
    InvalidArgument {
        argument: &'static str,
        reason: String,
    },

    #[error("Atom {atom} not found in residue {residue}")]
    MissingAtom { atom: String, residue: String },

    #[error("Contract violation in {variant}: {message}")]
    Contract {
        variant: &'static str,
        message: String,
    },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: SerializationError,
    },

    #[error("Engine error: {source}")]
    Engine {
        #[from]
        source: EngineError,
    },

    #[error("Expression error: {source}")]
    Expression {
        #[from]
        source: ExpressionError,
    },

    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Reference data error: {source}")]
    Reference {
        #[from]
        source: ReferenceError,
    },
}

impl CvError {
    /// Whether the error stems from invalid construction inputs.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CvError::BlockCountOutOfRange { .. }
                | CvError::GroupCountOutOfRange { .. }
                | CvError::BlockSizeMismatch { .. }
                | CvError::InvalidArgument { .. }
                | CvError::Config { .. }
        )
    }

    pub(crate) fn invalid(argument: &'static str, reason: impl Into<String>) -> Self {
        CvError::InvalidArgument {
            argument,
            reason: reason.into(),
        }
    }
}
