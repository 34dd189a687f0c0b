//! Graph diff computation for incremental updates

use crate::model::*;
use serde::{Deserialize, Serialize};

/// Represents a change to the graph that should be handed to the renderer.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GraphDiff {
    /// Monotonically increasing diff sequence number.
    pub sequence: u64,
    /// Nodes added in this update.
    pub added_nodes: Vec<GraphNode>,
    /// Nodes removed in this update.
    pub removed_nodes: Vec<NodeId>,
    /// Edges added in this update.
    pub added_edges: Vec<GraphEdge>,
    /// Edges removed in this update.
    pub removed_edges: Vec<EdgeId>,
    /// Nodes whose data, size or parent changed (positions are kept).
    pub modified_nodes: Vec<GraphNode>,
}

impl GraphDiff {
    /// Create an empty diff with given sequence number.
    pub fn new(sequence: u64) -> Self {
        GraphDiff {
            sequence,
            ..Default::default()
        }
    }

    /// Check if this diff is empty (no changes).
    pub fn is_empty(&self) -> bool {
        self.added_nodes.is_empty()
            && self.removed_nodes.is_empty()
            && self.added_edges.is_empty()
            && self.removed_edges.is_empty()
            && self.modified_nodes.is_empty()
    }

    /// Fold a later change into this one.
    pub fn extend(&mut self, other: GraphDiff) {
        self.added_nodes.extend(other.added_nodes);
        self.removed_nodes.extend(other.removed_nodes);
        self.added_edges.extend(other.added_edges);
        self.removed_edges.extend(other.removed_edges);
        self.modified_nodes.extend(other.modified_nodes);
        self.removed_edges.sort();
        self.removed_edges.dedup();
    }
}

/// Hands out sequence numbers to the diffs of successive updates.
pub struct DiffEngine {
    sequence: u64,
}

impl DiffEngine {
    pub fn new() -> Self {
        DiffEngine { sequence: 0 }
    }

    /// Stamp a diff with the next sequence number.
    pub fn stamp(&mut self, mut diff: GraphDiff) -> GraphDiff {
        self.sequence += 1;
        diff.sequence = self.sequence;
        diff
    }

    /// Get current sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new()
    }
}
