//! Graph store using petgraph::StableDiGraph addressed by derived NodeId/EdgeId

use crate::diff::GraphDiff;
use crate::error::GraphError;
use crate::model::*;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::Direction;
use std::collections::{HashMap, HashSet, VecDeque};

/// The visual graph: derived module/function/code nodes, annotation nodes and
/// derived edges. Node ids are content hashes, so an index map sits beside
/// the petgraph storage.
pub struct Graph {
    inner: StableDiGraph<GraphNode, GraphEdge>,
    nodes: HashMap<NodeId, NodeIndex>,
    edges: HashMap<EdgeId, EdgeIndex>,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

impl Graph {
    pub fn new() -> Self {
        Graph {
            inner: StableDiGraph::new(),
            nodes: HashMap::new(),
            edges: HashMap::new(),
        }
    }

    /// Insert a node, or replace the node with the same id.
    /// Returns `true` when the node was not present before.
    pub fn upsert_node(&mut self, node: GraphNode) -> bool {
        match self.nodes.get(&node.id) {
            Some(&idx) => {
                self.inner[idx] = node;
                false
            }
            None => {
                let id = node.id;
                let idx = self.inner.add_node(node);
                self.nodes.insert(id, idx);
                true
            }
        }
    }

    /// Add an edge between two existing nodes. An edge with the same id is
    /// replaced.
    pub fn add_edge(&mut self, edge: GraphEdge) -> Result<EdgeId, GraphError> {
        let source = self.index_of(edge.source, edge.id)?;
        let target = self.index_of(edge.target, edge.id)?;
        let id = edge.id;
        if let Some(old) = self.edges.remove(&id) {
            self.inner.remove_edge(old);
        }
        let idx = self.inner.add_edge(source, target, edge);
        self.edges.insert(id, idx);
        Ok(id)
    }

    fn index_of(&self, node: NodeId, edge: EdgeId) -> Result<NodeIndex, GraphError> {
        self.nodes
            .get(&node)
            .copied()
            .ok_or(GraphError::MissingEndpoint { edge, node })
    }

    /// Get a node by ID.
    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(&id).and_then(|&idx| self.inner.node_weight(idx))
    }

    /// Get a mutable node by ID.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut GraphNode> {
        let idx = *self.nodes.get(&id)?;
        self.inner.node_weight_mut(idx)
    }

    /// Get an edge by ID.
    pub fn edge(&self, id: EdgeId) -> Option<&GraphEdge> {
        self.edges.get(&id).and_then(|&idx| self.inner.edge_weight(idx))
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Iterate over all nodes.
    pub fn all_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.inner
            .node_indices()
            .filter_map(move |idx| self.inner.node_weight(idx))
    }

    /// Iterate over all edges.
    pub fn all_edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.inner
            .edge_indices()
            .filter_map(move |idx| self.inner.edge_weight(idx))
    }

    /// Get all outgoing edges from a node.
    pub fn edges_from(&self, source: NodeId) -> impl Iterator<Item = &GraphEdge> {
        self.edges_directed(source, Direction::Outgoing)
    }

    /// Get all incoming edges to a node.
    pub fn edges_to(&self, target: NodeId) -> impl Iterator<Item = &GraphEdge> {
        self.edges_directed(target, Direction::Incoming)
    }

    fn edges_directed(&self, node: NodeId, dir: Direction) -> impl Iterator<Item = &GraphEdge> {
        self.nodes
            .get(&node)
            .into_iter()
            .flat_map(move |&idx| self.inner.edges_directed(idx, dir))
            .map(|edge_ref| edge_ref.weight())
    }

    /// Check if an edge exists between two nodes of a specific kind.
    pub fn has_edge_between(&self, source: NodeId, target: NodeId, kind: EdgeKind) -> bool {
        self.edges_from(source)
            .any(|e| e.target == target && e.kind == kind)
    }

    /// Ids of every edge touching `id`.
    pub fn incident_edges(&self, id: NodeId) -> Vec<EdgeId> {
        self.edges_from(id)
            .chain(self.edges_to(id))
            .map(|e| e.id)
            .collect()
    }

    /// Get all nodes of a specific kind.
    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = NodeId> + '_ {
        self.all_nodes()
            .filter(move |n| n.kind() == kind)
            .map(|n| n.id)
    }

    /// Derived nodes belonging to the file at `path`.
    pub fn nodes_in_file(&self, path: &str) -> Vec<NodeId> {
        self.all_nodes()
            .filter(|n| n.path() == Some(path))
            .map(|n| n.id)
            .collect()
    }

    /// Direct children (nodes whose `parent_id` is `id`).
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.all_nodes()
            .filter(|n| n.parent_id == Some(id))
            .map(|n| n.id)
            .collect()
    }

    /// All nodes owned, directly or transitively, by `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut by_parent: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for node in self.all_nodes() {
            if let Some(parent) = node.parent_id {
                by_parent.entry(parent).or_default().push(node.id);
            }
        }

        let mut found = Vec::new();
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            if let Some(children) = by_parent.get(&current) {
                for &child in children {
                    found.push(child);
                    queue.push_back(child);
                }
            }
        }
        found
    }

    /// Get all nodes that own a given node (following `parent_id`).
    pub fn ancestors(&self, node: NodeId) -> HashSet<NodeId> {
        let mut ancestors = HashSet::new();
        let mut current = self.node(node).and_then(|n| n.parent_id);
        while let Some(parent) = current {
            if !ancestors.insert(parent) {
                break;
            }
            current = self.node(parent).and_then(|n| n.parent_id);
        }
        ancestors
    }

    /// Remove a node and all its edges.
    pub fn remove_node(&mut self, id: NodeId) -> Option<GraphNode> {
        for edge in self.incident_edges(id) {
            self.edges.remove(&edge);
        }
        let idx = self.nodes.remove(&id)?;
        self.inner.remove_node(idx)
    }

    /// Remove a node together with everything it owns.
    pub fn remove_subtree(&mut self, id: NodeId) -> GraphDiff {
        let mut diff = GraphDiff::default();
        let mut doomed = self.descendants(id);
        doomed.push(id);
        for node in doomed {
            diff.removed_edges.extend(self.incident_edges(node));
            if self.remove_node(node).is_some() {
                diff.removed_nodes.push(node);
            }
        }
        diff.removed_edges.sort();
        diff.removed_edges.dedup();
        diff
    }

    /// Remove an edge by ID.
    pub fn remove_edge(&mut self, id: EdgeId) -> Option<GraphEdge> {
        let idx = self.edges.remove(&id)?;
        self.inner.remove_edge(idx)
    }

    pub fn move_node(&mut self, id: NodeId, position: Position) -> Result<(), GraphError> {
        let node = self.node_mut(id).ok_or(GraphError::UnknownNode(id))?;
        node.position = position;
        Ok(())
    }

    /// Merge the freshly derived nodes of one file into the graph.
    ///
    /// Nodes that already exist keep their position and take the new size,
    /// data and parent. New nodes take the derived position unless a removed
    /// node with the same placement key hands its position over. Nodes of
    /// this file that were not derived again are removed with their edges.
    pub fn merge_file(&mut self, path: &str, derived: FileGraph) -> Result<GraphDiff, GraphError> {
        let derived_ids: HashSet<NodeId> = derived.nodes().map(|n| n.id).collect();
        for node in derived.nodes() {
            if node.path() != Some(path) {
                return Err(GraphError::Invariant(format!(
                    "node {} derived for {path} belongs to another file",
                    node.id
                )));
            }
            if let Some(parent) = node.parent_id {
                if !derived_ids.contains(&parent) {
                    return Err(GraphError::Invariant(format!(
                        "node {} is owned by {parent}, which was not derived",
                        node.id
                    )));
                }
            }
        }

        let mut diff = GraphDiff::default();
        let stale: Vec<NodeId> = self
            .nodes_in_file(path)
            .into_iter()
            .filter(|id| !derived_ids.contains(id))
            .collect();

        let mut handed_over: HashMap<(NodeKind, String), Position> = stale
            .iter()
            .filter_map(|&id| self.node(id))
            .filter_map(|n| n.placement_key().map(|key| (key, n.position)))
            .collect();

        for id in stale {
            diff.removed_edges.extend(self.incident_edges(id));
            if self.remove_node(id).is_some() {
                diff.removed_nodes.push(id);
            }
        }
        diff.removed_edges.sort();
        diff.removed_edges.dedup();

        for mut node in derived.into_nodes() {
            match self.node_mut(node.id) {
                Some(existing) => {
                    node.position = existing.position;
                    if *existing != node {
                        *existing = node.clone();
                        diff.modified_nodes.push(node);
                    }
                }
                None => {
                    if let Some(position) = node.placement_key().and_then(|k| handed_over.remove(&k)) {
                        node.position = position;
                    }
                    self.upsert_node(node.clone());
                    diff.added_nodes.push(node);
                }
            }
        }

        Ok(diff)
    }

    /// Remove every derived node of a file.
    pub fn remove_file(&mut self, path: &str) -> GraphDiff {
        let mut diff = GraphDiff::default();
        let module = NodeId::module(path);
        if self.contains_node(module) {
            diff.extend(self.remove_subtree(module));
        }
        // Anything left behind by an inconsistent parent chain.
        for id in self.nodes_in_file(path) {
            diff.removed_edges.extend(self.incident_edges(id));
            if self.remove_node(id).is_some() {
                diff.removed_nodes.push(id);
            }
        }
        diff
    }

    /// Swap one derived edge set for a freshly computed one in a single step.
    ///
    /// The replaced set is every edge of `kind`, narrowed to edges produced
    /// by `file` when given. Endpoints are validated before anything changes.
    pub fn replace_edges(
        &mut self,
        kind: EdgeKind,
        file: Option<&str>,
        edges: Vec<GraphEdge>,
    ) -> Result<GraphDiff, GraphError> {
        for edge in &edges {
            self.index_of(edge.source, edge.id)?;
            self.index_of(edge.target, edge.id)?;
        }

        let fresh: HashMap<EdgeId, GraphEdge> = edges.into_iter().map(|e| (e.id, e)).collect();
        let current: Vec<EdgeId> = self
            .all_edges()
            .filter(|e| e.kind == kind && file.map_or(true, |f| e.file_path == f))
            .map(|e| e.id)
            .collect();

        let mut diff = GraphDiff::default();
        for id in current {
            if !fresh.contains_key(&id) {
                self.remove_edge(id);
                diff.removed_edges.push(id);
            }
        }

        let mut fresh: Vec<GraphEdge> = fresh.into_values().collect();
        fresh.sort_by_key(|e| e.id);
        for edge in fresh {
            match self.edge(edge.id) {
                Some(existing) if *existing == edge => {}
                _ => {
                    self.add_edge(edge.clone())?;
                    diff.added_edges.push(edge);
                }
            }
        }
        Ok(diff)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}
