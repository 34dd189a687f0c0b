//! Sprig Core — declaration model, visual graph store, layout metrics and diffs

pub mod diff;
pub mod error;
pub mod graph;
pub mod layout;
pub mod model;
pub mod snapshot;

#[cfg(test)]
pub mod tests;

pub use diff::{DiffEngine, GraphDiff};
pub use error::GraphError;
pub use graph::Graph;
pub use layout::{LayoutConfig, estimate_size};
pub use model::{
    CallSite, CodeData, DeclId, EdgeId, EdgeKind, Export, ExportHandle, FileDeclarations, FileGraph,
    FileStatus, FunctionData, FunctionDecl, GraphEdge, GraphNode, ImageData, Import, ImportBinding,
    ImportHandle, ImportStatus, ImportType, MarkdownData, ModuleData, NodeData, NodeId, NodeKind,
    Position, Size, Span, TextData,
};
pub use snapshot::{
    SESSION_SNAPSHOT, SNAPSHOT_DIR, SessionSnapshot, clear_snapshot, load_snapshot, save_snapshot,
    snapshot_dir, snapshot_path,
};
