//! Derivation errors

use sprig_core::{DeclId, GraphError};

/// Internal invariant violations found while deriving a file's graph.
///
/// Syntax errors are not derivation errors; they are reported as
/// [`crate::ParseFailure`] before derivation starts.
#[derive(Debug, thiserror::Error)]
pub enum DeriveError {
    #[error("no function node at line {line}, column {column}")]
    MissingTreeNode { line: u32, column: u32 },

    #[error("declaration {child} names missing parent {parent}")]
    MissingParent { child: DeclId, parent: DeclId },

    #[error("declaration {id} has depth {depth}, expected {expected}")]
    DepthMismatch { id: DeclId, depth: u32, expected: u32 },

    #[error("frame for declaration {0} was not computed")]
    MissingFrame(DeclId),
}

impl From<DeriveError> for GraphError {
    fn from(err: DeriveError) -> Self {
        GraphError::Invariant(err.to_string())
    }
}
