//! Workspace orchestrator
//!
//! Owns every file record and the visual graph. Each operation runs the
//! file's state transition, re-derives that file's nodes and the
//! workspace-wide import edges, validates them, and only then merges them
//! into the graph, all before returning.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use sprig_core::{
    DiffEngine, EdgeKind, FileDeclarations, FileGraph, Graph, GraphDiff, GraphEdge, GraphNode,
    ImageData, ImportBinding, ImportHandle, LayoutConfig, MarkdownData, NodeData, NodeId, Position,
    SessionSnapshot, Size, TextData, load_snapshot, save_snapshot,
};
use sprig_indexer::resolver::{import_target_path, resolve_import, resolve_imports};
use sprig_indexer::{
    Dialect, ImportLink, SprigConfig, TreeParser, call_edges, derive_module_graph,
    import_export_edges, import_handles, link_imports,
};

use crate::error::{EditError, SessionError};
use crate::io::FileIo;
use crate::state::{FileEvent, FileRecord, Outcome, reduce};

/// A user-authored node that is not derived from source.
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    Text(String),
    Image { src: String, alt: Option<String> },
    Markdown(String),
}

/// One file's next record and everything derived from it, not yet applied.
struct StagedFile {
    path: String,
    record: Option<FileRecord>,
    derived: Option<FileGraph>,
    calls: Vec<GraphEdge>,
}

pub struct Workspace {
    root: PathBuf,
    layout: LayoutConfig,
    io: Box<dyn FileIo>,
    parser: TreeParser,
    files: BTreeMap<String, FileRecord>,
    graph: Graph,
    diffs: DiffEngine,
    next_annotation: u64,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>, config: &SprigConfig, io: Box<dyn FileIo>) -> Self {
        Self {
            root: root.into(),
            layout: config.layout,
            io,
            parser: TreeParser::with_cache_capacity(config.parse_cache_capacity),
            files: BTreeMap::new(),
            graph: Graph::new(),
            diffs: DiffEngine::new(),
            next_annotation: 1,
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn io(&self) -> &dyn FileIo {
        self.io.as_ref()
    }

    pub fn file(&self, path: &str) -> Option<&FileRecord> {
        self.files.get(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn declarations(&self, path: &str) -> Option<&FileDeclarations> {
        self.files.get(path)?.declarations.as_ref()
    }

    /// Raw text differs from the last saved text.
    pub fn is_dirty(&self, path: &str) -> bool {
        self.files.get(path).is_some_and(|f| f.source.is_dirty())
    }

    pub fn sequence(&self) -> u64 {
        self.diffs.sequence()
    }

    // ── File lifecycle ────────────────────────────────────────

    /// Load text that did not come through the I/O collaborator.
    pub fn load_text(&mut self, path: &str, text: &str) -> Result<GraphDiff, SessionError> {
        let (diff, _) = self.apply(path, FileEvent::Loaded(text.to_string()))?;
        Ok(diff)
    }

    pub fn load_file(&mut self, path: &str) -> Result<GraphDiff, SessionError> {
        let text = self.io.load_file(path)?;
        self.load_text(path, &text)
    }

    /// Load every source file the I/O collaborator lists. Files that fail to
    /// parse are loaded with an error status and do not stop the others.
    /// Files that cannot be read at all are skipped.
    pub fn load_folder(&mut self) -> Result<GraphDiff, SessionError> {
        let paths = self.io.load_folder_tree()?;
        let mut staged = Vec::with_capacity(paths.len());
        let mut skipped = 0;
        for path in &paths {
            let text = match self.io.load_file(path) {
                Ok(text) => text,
                Err(err) => {
                    tracing::warn!("Skipping {}: {:#}", path, err);
                    skipped += 1;
                    continue;
                }
            };
            let transition = reduce(
                &mut self.parser,
                &self.layout,
                path,
                self.files.get(path),
                FileEvent::Loaded(text),
            )?;
            staged.push(self.stage(path, transition.file)?);
        }
        let diff = self.install(staged)?;
        tracing::info!(
            "Loaded {} files ({} skipped): {} nodes, {} edges",
            paths.len() - skipped,
            skipped,
            self.graph.node_count(),
            self.graph.edge_count()
        );
        Ok(self.diffs.stamp(diff))
    }

    pub fn remove_file(&mut self, path: &str) -> Result<GraphDiff, SessionError> {
        let (diff, _) = self.apply(path, FileEvent::Removed)?;
        tracing::info!("Removed {}", path);
        Ok(diff)
    }

    /// Write the file's raw text through the I/O collaborator.
    pub fn save_file(&mut self, path: &str) -> Result<GraphDiff, SessionError> {
        let record = self
            .files
            .get(path)
            .ok_or_else(|| SessionError::UnknownFile(path.to_string()))?;
        self.io.save_file(path, &record.source.raw_text)?;
        let (diff, _) = self.apply(path, FileEvent::Saved)?;
        tracing::info!("Saved {}", path);
        Ok(diff)
    }

    /// Create the file a `MissingFile` import points at, with a stub export
    /// for every name the importer expects, and load it.
    pub fn create_missing_file(
        &mut self,
        importer: &str,
        specifier: &str,
    ) -> Result<(String, GraphDiff), SessionError> {
        let not_missing = || SessionError::NotMissing {
            importer: importer.to_string(),
            specifier: specifier.to_string(),
        };
        let target = import_target_path(importer, specifier).ok_or_else(not_missing)?;
        if resolve_import(&self.files, importer, specifier).is_some() {
            return Err(not_missing());
        }

        let path = if Dialect::from_path(&target).is_some() {
            target
        } else {
            let extension = importer.rsplit_once('.').map_or("js", |(_, ext)| ext);
            format!("{target}.{extension}")
        };

        let text = self
            .declarations(importer)
            .map(|decls| stub_exports(decls, specifier))
            .unwrap_or_default();
        self.io.save_file(&path, &text)?;
        let diff = self.load_text(&path, &text)?;
        tracing::info!("Created {} for import `{}` in {}", path, specifier, importer);
        Ok((path, diff))
    }

    // ── Edits ─────────────────────────────────────────────────

    /// Apply text typed into a node's editor.
    ///
    /// Function and code nodes are spliced into their file and the file is
    /// re-derived. Text and markdown annotations take the text directly.
    pub fn on_text_change(&mut self, node: NodeId, text: &str) -> Result<GraphDiff, SessionError> {
        let target = self.graph.node(node).ok_or(EditError::UnknownNode(node))?;
        let path = match &target.data {
            NodeData::Function(f) => f.path.clone(),
            NodeData::Code(c) => c.path.clone(),
            NodeData::Text(_) | NodeData::Markdown(_) => return self.edit_annotation(node, text),
            NodeData::Module(_) | NodeData::Image(_) => {
                return Err(EditError::NotEditable(node).into());
            }
        };

        let event = FileEvent::TextEdited {
            node,
            text: text.to_string(),
        };
        match self.apply(&path, event)? {
            (_, Outcome::Rejected(failure)) => Err(EditError::Malformed(failure).into()),
            (diff, _) => Ok(diff),
        }
    }

    /// Replace a whole file's text, as typed in a file-level editor.
    pub fn on_file_text_change(&mut self, path: &str, text: &str) -> Result<GraphDiff, SessionError> {
        match self.apply(path, FileEvent::FileTextReplaced(text.to_string()))? {
            (_, Outcome::Rejected(failure)) => Err(EditError::Malformed(failure).into()),
            (diff, _) => Ok(diff),
        }
    }

    pub fn add_annotation_node(
        &mut self,
        annotation: Annotation,
        position: Position,
    ) -> Result<(NodeId, GraphDiff), SessionError> {
        while self.graph.contains_node(NodeId::annotation(self.next_annotation)) {
            self.next_annotation += 1;
        }
        let id = NodeId::annotation(self.next_annotation);
        self.next_annotation += 1;

        let (size, data) = match annotation {
            Annotation::Text(text) => (
                self.layout.estimate_size(&text),
                NodeData::Text(TextData { text }),
            ),
            Annotation::Markdown(markdown) => (
                self.layout.estimate_size(&markdown),
                NodeData::Markdown(MarkdownData { markdown }),
            ),
            Annotation::Image { src, alt } => (
                Size::new(self.layout.min_width * 2.0, self.layout.min_width * 1.5),
                NodeData::Image(ImageData { src, alt }),
            ),
        };
        let node = GraphNode {
            id,
            parent_id: None,
            position,
            size,
            data,
        };
        self.graph.upsert_node(node.clone());

        let mut diff = GraphDiff::default();
        diff.added_nodes.push(node);
        Ok((id, self.diffs.stamp(diff)))
    }

    pub fn move_node(&mut self, node: NodeId, position: Position) -> Result<GraphDiff, SessionError> {
        self.graph.move_node(node, position)?;
        let mut diff = GraphDiff::default();
        if let Some(moved) = self.graph.node(node) {
            diff.modified_nodes.push(moved.clone());
        }
        Ok(self.diffs.stamp(diff))
    }

    // ── Snapshots ─────────────────────────────────────────────

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::capture(&self.graph, &self.root)
    }

    /// Re-apply saved positions and annotations. Nodes that no longer exist
    /// are skipped.
    pub fn restore_snapshot(&mut self, snapshot: &SessionSnapshot) -> GraphDiff {
        let before: HashMap<NodeId, Position> =
            self.graph.all_nodes().map(|n| (n.id, n.position)).collect();
        let applied = snapshot.apply(&mut self.graph);

        let mut diff = GraphDiff::default();
        for node in self.graph.all_nodes() {
            match before.get(&node.id) {
                None => diff.added_nodes.push(node.clone()),
                Some(position) if *position != node.position => diff.modified_nodes.push(node.clone()),
                Some(_) => {}
            }
        }
        tracing::info!("Restored {} placements", applied);
        self.diffs.stamp(diff)
    }

    pub fn save_session(&self) -> anyhow::Result<PathBuf> {
        save_snapshot(&self.snapshot(), &self.root)
    }

    /// Restore `.sprig/session.json` if present.
    pub fn restore_session(&mut self) -> anyhow::Result<Option<GraphDiff>> {
        let Some(snapshot) = load_snapshot(&self.root)? else {
            return Ok(None);
        };
        Ok(Some(self.restore_snapshot(&snapshot)))
    }

    // ── Internals ─────────────────────────────────────────────

    /// Run one event through the file's state machine and apply the result.
    fn apply(&mut self, path: &str, event: FileEvent) -> Result<(GraphDiff, Outcome), SessionError> {
        let transition = reduce(
            &mut self.parser,
            &self.layout,
            path,
            self.files.get(path),
            event,
        )?;
        let staged = self.stage(path, transition.file)?;
        let diff = self.install(vec![staged])?;
        Ok((self.diffs.stamp(diff), transition.outcome))
    }

    /// Derive one file's nodes and call edges without touching anything, and
    /// check that they only reference each other.
    fn stage(&self, path: &str, file: Option<FileRecord>) -> Result<StagedFile, SessionError> {
        let Some(record) = file else {
            return Ok(StagedFile {
                path: path.to_string(),
                record: None,
                derived: None,
                calls: Vec::new(),
            });
        };

        let derived = self.derive_file(path, &record)?;
        let calls = record
            .declarations
            .as_ref()
            .map(|decls| call_edges(path, decls))
            .unwrap_or_default();

        let ids: HashSet<NodeId> = derived.nodes().map(|n| n.id).collect();
        for node in derived.nodes() {
            if let Some(parent) = node.parent_id.filter(|p| !ids.contains(p)) {
                return Err(SessionError::Invariant(format!(
                    "node {} in {path} is owned by {parent}, which was not derived",
                    node.id
                )));
            }
        }
        for edge in &calls {
            if let Some(missing) = [edge.source, edge.target].into_iter().find(|id| !ids.contains(id)) {
                return Err(SessionError::Invariant(format!(
                    "call edge {} in {path} references missing node {missing}",
                    edge.id
                )));
            }
        }

        Ok(StagedFile {
            path: path.to_string(),
            record: Some(record),
            derived: Some(derived),
            calls,
        })
    }

    /// Swap staged files in: store their records, recompute the workspace
    /// import links, validate them, and only then merge into the graph.
    /// A failed validation puts the previous records back.
    fn install(&mut self, staged: Vec<StagedFile>) -> Result<GraphDiff, SessionError> {
        let mut previous: Vec<(String, Option<FileRecord>)> = Vec::with_capacity(staged.len());
        let mut pending: Vec<(String, Option<FileGraph>, Vec<GraphEdge>)> = Vec::with_capacity(staged.len());
        for file in staged {
            let old = match file.record {
                Some(record) => self.files.insert(file.path.clone(), record),
                None => self.files.remove(&file.path),
            };
            previous.push((file.path.clone(), old));
            pending.push((file.path, file.derived, file.calls));
        }

        let (mut handles, edges) = self.compute_links();
        if let Err(err) = self.check_import_edges(&pending, &edges) {
            for (path, old) in previous.into_iter().rev() {
                match old {
                    Some(record) => self.files.insert(path, record),
                    None => self.files.remove(&path),
                };
            }
            return Err(err);
        }

        let mut diff = GraphDiff::default();
        for (path, derived, calls) in pending {
            let Some(mut derived) = derived else {
                diff.extend(self.graph.remove_file(&path));
                continue;
            };
            if let Some(imports) = handles.remove(&derived.module.id) {
                if let NodeData::Module(module) = &mut derived.module.data {
                    module.imports = imports;
                }
            }
            if !self.graph.contains_node(derived.module.id) {
                derived.module.position = self.next_module_position();
            }

            let mut merged = self.graph.merge_file(&path, derived)?;
            merged.extend(self.graph.replace_edges(EdgeKind::InternalCall, Some(&path), calls)?);
            tracing::debug!(
                "Merged {}: +{} -{} ~{} nodes",
                path,
                merged.added_nodes.len(),
                merged.removed_nodes.len(),
                merged.modified_nodes.len()
            );
            diff.extend(merged);
        }

        diff.extend(self.graph.replace_edges(EdgeKind::ImportExport, None, edges)?);
        for (module_id, imports) in handles {
            let Some(node) = self.graph.node_mut(module_id) else {
                continue;
            };
            if let NodeData::Module(module) = &mut node.data {
                if module.imports != imports {
                    module.imports = imports;
                    diff.modified_nodes.push(node.clone());
                }
            }
        }
        Ok(diff)
    }

    /// Every module's import handles and the whole import/export edge set,
    /// computed from the stored records.
    fn compute_links(&self) -> (HashMap<NodeId, Vec<ImportHandle>>, Vec<GraphEdge>) {
        let mut handles = HashMap::new();
        let mut edges = Vec::new();
        for (path, record) in &self.files {
            let Some(declarations) = record.declarations.as_ref() else {
                continue;
            };
            let resolved = self.resolved(path, declarations);
            let links = self.links(&resolved);
            edges.extend(import_export_edges(path, &resolved.imports, &links));
            handles.insert(NodeId::module(path), import_handles(&resolved, &links));
        }
        (handles, edges)
    }

    /// Import edges may only join modules that will exist once the staged
    /// files are merged.
    fn check_import_edges(
        &self,
        pending: &[(String, Option<FileGraph>, Vec<GraphEdge>)],
        edges: &[GraphEdge],
    ) -> Result<(), SessionError> {
        let staged: HashSet<&str> = pending.iter().map(|(path, _, _)| path.as_str()).collect();
        let staged_modules: HashSet<NodeId> = pending
            .iter()
            .filter_map(|(_, derived, _)| derived.as_ref().map(|d| d.module.id))
            .collect();
        let alive = |id: NodeId| {
            staged_modules.contains(&id)
                || self
                    .graph
                    .node(id)
                    .is_some_and(|n| n.path().is_some_and(|p| !staged.contains(p)))
        };
        for edge in edges {
            if let Some(missing) = [edge.source, edge.target].into_iter().find(|&id| !alive(id)) {
                return Err(SessionError::Invariant(format!(
                    "import edge {} references missing node {missing}",
                    edge.id
                )));
            }
        }
        Ok(())
    }

    /// New modules line up left to right.
    fn next_module_position(&self) -> Position {
        let right_edge = self
            .graph
            .all_nodes()
            .filter(|n| n.parent_id.is_none() && n.as_module().is_some())
            .map(|n| n.position.x + n.size.width)
            .fold(None, |max: Option<f64>, x| Some(max.map_or(x, |m| m.max(x))));
        match right_edge {
            Some(x) => Position::new(x + self.layout.spacing * 2.0, 0.0),
            None => Position::default(),
        }
    }

    fn edit_annotation(&mut self, node: NodeId, text: &str) -> Result<GraphDiff, SessionError> {
        let size = self.layout.estimate_size(text);
        let target = self.graph.node_mut(node).ok_or(EditError::UnknownNode(node))?;
        match &mut target.data {
            NodeData::Text(t) => t.text = text.to_string(),
            NodeData::Markdown(m) => m.markdown = text.to_string(),
            _ => return Err(EditError::NotEditable(node).into()),
        }
        target.size = size;
        let mut diff = GraphDiff::default();
        diff.modified_nodes.push(target.clone());
        Ok(self.diffs.stamp(diff))
    }
}

/// Exports a new file needs to satisfy the importer's bindings.
fn stub_exports(importer: &FileDeclarations, specifier: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for import in importer.imports.iter().filter(|i| i.module_specifier == specifier) {
        let line = match import.binding {
            ImportBinding::Default => format!("export default function {}() {{}}", import.local_name),
            ImportBinding::Named => format!("export function {}() {{}}", import.name),
            ImportBinding::Namespace => continue,
        };
        if !lines.contains(&line) {
            lines.push(line);
        }
    }
    if lines.is_empty() {
        return String::new();
    }
    let mut text = lines.join("\n\n");
    text.push('\n');
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryFileIo;

    fn loaded(files: &[(&str, &str)]) -> Workspace {
        let io = MemoryFileIo::with_files(files);
        let mut workspace = Workspace::new("/project", &SprigConfig::default(), Box::new(io));
        workspace.load_folder().unwrap();
        workspace
    }

    #[test]
    fn test_stage_leaves_workspace_untouched() {
        let text = "function add(a, b) {\n  return a + b;\n}\n\nfunction double(x) {\n  return add(x, x);\n}\n";
        let workspace = loaded(&[("a.js", text)]);
        let nodes = workspace.graph().node_count();
        let record = workspace.file("a.js").cloned();

        let staged = workspace.stage("a.js", record).unwrap();
        let derived = staged.derived.unwrap();
        assert_eq!(derived.module.id, NodeId::module("a.js"));
        assert_eq!(derived.children.len(), 2);
        assert_eq!(staged.calls.len(), 1);
        assert_eq!(workspace.graph().node_count(), nodes);
        assert_eq!(workspace.sequence(), 1);
    }

    #[test]
    fn test_install_rolls_back_when_import_edges_dangle() {
        let mut workspace = loaded(&[
            ("a.js", "export function foo() {}\n"),
            ("b.js", "import { foo } from './a.js';\nfoo();\n"),
        ]);
        let nodes = workspace.graph().node_count();
        let edges = workspace.graph().edge_count();

        // a.js keeps a record but derives no nodes, so b's import edge has
        // no module to land on.
        let staged = StagedFile {
            path: "a.js".to_string(),
            record: workspace.file("a.js").cloned(),
            derived: None,
            calls: Vec::new(),
        };
        let result = workspace.install(vec![staged]);
        assert!(matches!(result, Err(SessionError::Invariant(_))));

        assert_eq!(workspace.graph().node_count(), nodes);
        assert_eq!(workspace.graph().edge_count(), edges);
        assert!(workspace.graph().contains_node(NodeId::module("a.js")));
        let paths: Vec<&str> = workspace.paths().collect();
        assert_eq!(paths, vec!["a.js", "b.js"]);
    }

    #[test]
    fn test_install_rolls_back_new_records() {
        let mut workspace = loaded(&[("b.js", "import { foo } from './a.js';\nfoo();\n")]);
        let donor = loaded(&[("a.js", "export function foo() {}\n")]);

        let staged = StagedFile {
            path: "a.js".to_string(),
            record: donor.file("a.js").cloned(),
            derived: None,
            calls: Vec::new(),
        };
        assert!(workspace.install(vec![staged]).is_err());
        assert!(workspace.file("a.js").is_none());
        assert_eq!(workspace.graph().edge_count(), 0);
    }
}
