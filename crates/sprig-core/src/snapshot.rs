//! Session snapshots: node placements and annotation nodes

use crate::graph::Graph;
use crate::model::{GraphNode, NodeId, NodeKind, Position};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Snapshot directory: .sprig/
pub const SNAPSHOT_DIR: &str = ".sprig";

/// Session snapshot file
pub const SESSION_SNAPSHOT: &str = "session.json";

/// Where the user put a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub id: NodeId,
    pub position: Position,
    /// Kind and name chain of the node, used when `id` no longer matches.
    #[serde(default)]
    pub key: Option<(NodeKind, String)>,
}

/// Layout state saved per workspace root. Derived content is never stored;
/// it is recomputed from source on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub version: String,
    pub root: String,
    pub saved_at: String,
    pub placements: Vec<Placement>,
    /// Text, image and markdown nodes, stored whole.
    pub annotations: Vec<GraphNode>,
}

impl SessionSnapshot {
    pub fn capture(graph: &Graph, root: &Path) -> Self {
        let mut placements: Vec<Placement> = graph
            .all_nodes()
            .filter(|n| n.kind().is_derived())
            .map(|n| Placement {
                id: n.id,
                position: n.position,
                key: n.placement_key(),
            })
            .collect();
        placements.sort_by_key(|p| p.id);

        let mut annotations: Vec<GraphNode> = graph
            .all_nodes()
            .filter(|n| !n.kind().is_derived())
            .cloned()
            .collect();
        annotations.sort_by_key(|n| n.id);

        SessionSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            root: root.display().to_string(),
            saved_at: chrono::Utc::now().to_rfc3339(),
            placements,
            annotations,
        }
    }

    /// Re-apply saved positions to nodes that still exist and restore the
    /// annotation nodes. A placement whose id is gone lands on the node with
    /// the same placement key, unless that node was placed by id. Returns
    /// how many placements were applied.
    pub fn apply(&self, graph: &mut Graph) -> usize {
        let mut applied = 0;
        let mut placed: HashSet<NodeId> = HashSet::new();
        let mut unmatched: Vec<&Placement> = Vec::new();
        for placement in &self.placements {
            if graph.move_node(placement.id, placement.position).is_ok() {
                placed.insert(placement.id);
                applied += 1;
            } else {
                unmatched.push(placement);
            }
        }

        if !unmatched.is_empty() {
            let by_key: HashMap<(NodeKind, String), NodeId> = graph
                .all_nodes()
                .filter(|n| !placed.contains(&n.id))
                .filter_map(|n| n.placement_key().map(|key| (key, n.id)))
                .collect();
            for placement in unmatched {
                let Some(&id) = placement.key.as_ref().and_then(|key| by_key.get(key)) else {
                    continue;
                };
                if placed.insert(id) && graph.move_node(id, placement.position).is_ok() {
                    applied += 1;
                }
            }
        }

        for annotation in &self.annotations {
            graph.upsert_node(annotation.clone());
        }
        applied
    }
}

/// Get snapshot directory path
pub fn snapshot_dir(root: &Path) -> PathBuf {
    root.join(SNAPSHOT_DIR)
}

/// Get session snapshot file path
pub fn snapshot_path(root: &Path) -> PathBuf {
    root.join(SNAPSHOT_DIR).join(SESSION_SNAPSHOT)
}

/// Ensure snapshot directory exists
pub fn ensure_snapshot_dir(root: &Path) -> std::io::Result<()> {
    let dir = snapshot_dir(root);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
    }
    Ok(())
}

pub fn save_snapshot(snapshot: &SessionSnapshot, root: &Path) -> anyhow::Result<PathBuf> {
    ensure_snapshot_dir(root)?;
    let path = snapshot_path(root);
    let json_str = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(&path, json_str)?;

    tracing::debug!("Session snapshot saved: {}", path.display());
    Ok(path)
}

pub fn load_snapshot(root: &Path) -> anyhow::Result<Option<SessionSnapshot>> {
    let path = snapshot_path(root);
    if !path.exists() {
        return Ok(None);
    }

    let json_str = std::fs::read_to_string(&path)?;
    let snapshot: SessionSnapshot = serde_json::from_str(&json_str)?;

    tracing::debug!("Session snapshot loaded from: {}", path.display());
    Ok(Some(snapshot))
}

/// Clear snapshot directory
pub fn clear_snapshot(root: &Path) -> std::io::Result<()> {
    let dir = snapshot_dir(root);
    if dir.exists() {
        std::fs::remove_dir_all(&dir)?;
    }
    Ok(())
}
