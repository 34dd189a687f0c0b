//! Workspace errors

use sprig_core::{GraphError, NodeId};
use sprig_indexer::{DeriveError, ParseFailure};

/// A text edit the workspace could not apply.
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    /// The edited text does not parse; the last parsed state still stands.
    #[error("edit rejected: {0}")]
    Malformed(ParseFailure),

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("node {0} has no editable text")]
    NotEditable(NodeId),

    #[error("{0} has never parsed; edit the file text instead")]
    FileNotParsed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("unknown file {0}")]
    UnknownFile(String),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error("`{specifier}` imported by {importer} is not a missing local file")]
    NotMissing { importer: String, specifier: String },

    #[error(transparent)]
    Io(#[from] anyhow::Error),

    /// Programming error inside derivation or graph maintenance.
    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl From<GraphError> for SessionError {
    fn from(err: GraphError) -> Self {
        SessionError::Invariant(err.to_string())
    }
}

impl From<DeriveError> for SessionError {
    fn from(err: DeriveError) -> Self {
        SessionError::Invariant(err.to_string())
    }
}
