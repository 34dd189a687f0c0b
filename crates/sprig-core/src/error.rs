//! Graph store errors

use crate::model::{EdgeId, NodeId};

/// Programming errors in graph maintenance. Expected conditions such as parse
/// failures or unresolved imports never surface as a `GraphError`.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("edge {edge} references missing node {node}")]
    MissingEndpoint { edge: EdgeId, node: NodeId },

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("invariant violated: {0}")]
    Invariant(String),
}
