//! Error types for the call boundary.
//!
//! Only invalid caller input is an error. Lookups that miss return `null`,
//! ambiguity and malformed persisted state are logged and absorbed.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Missing argument {index} for {op}")]
    MissingArgument { op: String, index: usize },

    #[error("Invalid argument {index} for {op}: {reason}")]
    InvalidArgument {
        op: String,
        index: usize,
        reason: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
