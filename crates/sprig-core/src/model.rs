//! Core data structures for declarations and the visual graph

use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Content-derived identifier of an extracted function declaration.
///
/// Derived from `(name, parent id, body text)` so re-parsing unchanged code
/// yields the same id. Incremental merging depends on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct DeclId(pub u64);

impl DeclId {
    pub fn new(name: &str, parent: Option<DeclId>, body_text: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        parent.hash(&mut hasher);
        body_text.hash(&mut hasher);
        DeclId(hasher.finish())
    }

    /// Re-derive an id for the `ordinal`-th duplicate of the same declaration.
    pub fn with_ordinal(self, ordinal: usize) -> Self {
        let mut hasher = DefaultHasher::new();
        self.0.hash(&mut hasher);
        ordinal.hash(&mut hasher);
        DeclId(hasher.finish())
    }
}

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Unique, stable identifier for a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Node of the module representing the file at `path`.
    pub fn module(path: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        "module".hash(&mut hasher);
        path.hash(&mut hasher);
        NodeId(hasher.finish())
    }

    /// Node holding the root-level code of the file at `path`.
    pub fn code(path: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        "code".hash(&mut hasher);
        path.hash(&mut hasher);
        NodeId(hasher.finish())
    }

    pub fn function(path: &str, decl: DeclId) -> Self {
        let mut hasher = DefaultHasher::new();
        "function".hash(&mut hasher);
        path.hash(&mut hasher);
        decl.hash(&mut hasher);
        NodeId(hasher.finish())
    }

    /// User-authored annotation node number `seq`.
    pub fn annotation(seq: u64) -> Self {
        let mut hasher = DefaultHasher::new();
        "annotation".hash(&mut hasher);
        seq.hash(&mut hasher);
        NodeId(hasher.finish())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Unique edge identifier (hash of kind, endpoints and handles).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct EdgeId(pub u64);

impl EdgeId {
    pub fn new(
        kind: EdgeKind,
        source: NodeId,
        target: NodeId,
        source_handle: &str,
        target_handle: &str,
    ) -> Self {
        let mut hasher = DefaultHasher::new();
        kind.hash(&mut hasher);
        source.hash(&mut hasher);
        target.hash(&mut hasher);
        source_handle.hash(&mut hasher);
        target_handle.hash(&mut hasher);
        EdgeId(hasher.finish())
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

// ── Source positions and geometry ──────────────────────────

/// Source range: 1-based lines, 0-based byte columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Span {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Position { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Size { width, height }
    }
}

// ── Declarations ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportType {
    /// Relative or absolute specifier (`./x`, `../y`, `/z`).
    Local,
    /// Bare package specifier (`react`, `@scope/pkg`).
    External,
}

impl ImportType {
    pub fn of(specifier: &str) -> Self {
        if specifier.starts_with('.') || specifier.starts_with('/') {
            ImportType::Local
        } else {
            ImportType::External
        }
    }
}

/// Which kind of binding an import introduces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportBinding {
    Default,
    Named,
    Namespace,
}

/// One imported binding. A statement importing three names yields three.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Import {
    /// Imported name; for default imports this is the local binding name.
    pub name: String,
    pub local_name: String,
    pub binding: ImportBinding,
    pub module_specifier: String,
    pub import_type: ImportType,
    /// 1-based line of the declaring statement.
    pub line: u32,
    pub span: Span,
    /// Filled by the import resolver against the current file set.
    pub resolved_full_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Export {
    pub name: String,
    pub is_default: bool,
    pub span: Span,
}

/// A call expression inside a function's own region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallSite {
    pub name: String,
    pub line: u32,
}

/// A named, addressable function found in a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub id: DeclId,
    pub name: String,
    pub span: Span,
    /// Nesting level; 0 for functions with no captured enclosing function.
    pub depth: u32,
    pub parent_id: Option<DeclId>,
    pub parameters: Vec<String>,
    pub is_async: bool,
    /// Own statements only (nested function declarations stripped).
    pub body_text: String,
    pub nested_function_ids: Vec<DeclId>,
    pub content_size: Size,
    pub calls: Vec<CallSite>,
}

/// Everything extracted from one file. Recreated wholesale on every parse.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FileDeclarations {
    pub imports: Vec<Import>,
    pub exports: Vec<Export>,
    /// Functions in discovery order (parents always before their children).
    pub functions: Vec<FunctionDecl>,
    /// The program's own statements.
    pub root_code: String,
}

impl FileDeclarations {
    pub fn function(&self, id: DeclId) -> Option<&FunctionDecl> {
        self.functions.iter().find(|f| f.id == id)
    }

    pub fn top_level(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.functions.iter().filter(|f| f.parent_id.is_none())
    }

    pub fn children_of(&self, id: DeclId) -> impl Iterator<Item = &FunctionDecl> {
        self.functions
            .iter()
            .filter(move |f| f.parent_id == Some(id))
    }

    pub fn max_depth(&self) -> Option<u32> {
        self.functions.iter().map(|f| f.depth).max()
    }

    /// Slash-joined chain of names from the top-level ancestor down to `id`.
    pub fn qualified_name(&self, id: DeclId) -> Option<String> {
        let mut names = Vec::new();
        let mut current = self.function(id)?;
        loop {
            names.push(current.name.as_str());
            match current.parent_id.and_then(|p| self.function(p)) {
                Some(parent) => current = parent,
                None => break,
            }
        }
        names.reverse();
        Some(names.join("/"))
    }

    pub fn export(&self, name: &str) -> Option<&Export> {
        self.exports.iter().find(|e| e.name == name)
    }

    pub fn default_export(&self) -> Option<&Export> {
        self.exports.iter().find(|e| e.is_default)
    }
}

// ── Graph nodes ───────────────────────────────────────────

/// Discriminates what a graph node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    // ── Derived from source ─────────────────────────────────
    Module,
    Function,
    Code,

    // ── User-authored annotations ───────────────────────────
    Text,
    Image,
    Markdown,
}

impl NodeKind {
    pub fn is_derived(self) -> bool {
        matches!(self, NodeKind::Module | NodeKind::Function | NodeKind::Code)
    }
}

/// Visual state of one import on its module node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportStatus {
    /// Target file and a matching export were found.
    Resolved,
    /// Target file found but it exports no matching name.
    MissingExport,
    /// Local specifier that matches no loaded file.
    MissingFile,
    /// Bare package specifier, never resolved against the workspace.
    External,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportHandle {
    pub handle: String,
    pub name: String,
    pub local_name: String,
    pub module_specifier: String,
    pub line: u32,
    pub status: ImportStatus,
    pub resolved_full_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportHandle {
    pub handle: String,
    pub name: String,
    pub is_default: bool,
    pub line: u32,
}

/// Parse/save status surfaced on module nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FileStatus {
    /// Raw text differs from the last saved text.
    pub dirty: bool,
    pub parse_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleData {
    pub path: String,
    pub name: String,
    pub imports: Vec<ImportHandle>,
    pub exports: Vec<ExportHandle>,
    pub status: FileStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionData {
    pub path: String,
    pub decl_id: DeclId,
    pub name: String,
    pub qualified_name: String,
    pub parameters: Vec<String>,
    pub is_async: bool,
    pub code: String,
    pub depth: u32,
    pub line: u32,
    /// Set while a rejected edit is pending on this node.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeData {
    pub path: String,
    pub code: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextData {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    pub src: String,
    pub alt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkdownData {
    pub markdown: String,
}

/// Per-kind payload of a node; the variant is the node's type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeData {
    Module(ModuleData),
    Function(FunctionData),
    Code(CodeData),
    Text(TextData),
    Image(ImageData),
    Markdown(MarkdownData),
}

/// A single node in the visual graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    /// Owning node; positions are relative to it.
    pub parent_id: Option<NodeId>,
    pub position: Position,
    pub size: Size,
    pub data: NodeData,
}

impl GraphNode {
    pub fn kind(&self) -> NodeKind {
        match &self.data {
            NodeData::Module(_) => NodeKind::Module,
            NodeData::Function(_) => NodeKind::Function,
            NodeData::Code(_) => NodeKind::Code,
            NodeData::Text(_) => NodeKind::Text,
            NodeData::Image(_) => NodeKind::Image,
            NodeData::Markdown(_) => NodeKind::Markdown,
        }
    }

    /// Source file this node was derived from, if any.
    pub fn path(&self) -> Option<&str> {
        match &self.data {
            NodeData::Module(m) => Some(&m.path),
            NodeData::Function(f) => Some(&f.path),
            NodeData::Code(c) => Some(&c.path),
            _ => None,
        }
    }

    /// Identity that survives a change of content hash: kind plus the
    /// function's name chain. Used to keep a user's placement when a
    /// function body is edited.
    pub fn placement_key(&self) -> Option<(NodeKind, String)> {
        match &self.data {
            NodeData::Function(f) => Some((NodeKind::Function, format!("{}#{}", f.path, f.qualified_name))),
            NodeData::Module(m) => Some((NodeKind::Module, m.path.clone())),
            NodeData::Code(c) => Some((NodeKind::Code, c.path.clone())),
            _ => None,
        }
    }

    pub fn as_module(&self) -> Option<&ModuleData> {
        match &self.data {
            NodeData::Module(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionData> {
        match &self.data {
            NodeData::Function(f) => Some(f),
            _ => None,
        }
    }
}

/// Nodes derived from one file: the module node plus everything it owns.
#[derive(Debug, Clone, PartialEq)]
pub struct FileGraph {
    pub module: GraphNode,
    pub children: Vec<GraphNode>,
}

impl FileGraph {
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        std::iter::once(&self.module).chain(self.children.iter())
    }

    pub fn into_nodes(self) -> impl Iterator<Item = GraphNode> {
        std::iter::once(self.module).chain(self.children)
    }
}

// ── Graph edges ───────────────────────────────────────────

/// What kind of relationship this edge represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Importing module → exporting module.
    ImportExport,
    /// Callee definition → calling function, within one file.
    InternalCall,
}

/// A derived, directed edge. Never hand-authored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub source_handle: String,
    pub target_handle: String,
    pub kind: EdgeKind,
    /// Human-readable label (the imported or called name).
    pub label: Option<String>,
    /// File whose declarations produced this edge.
    pub file_path: String,
}

impl GraphEdge {
    pub fn new(
        kind: EdgeKind,
        source: NodeId,
        target: NodeId,
        source_handle: String,
        target_handle: String,
        label: Option<String>,
        file_path: String,
    ) -> Self {
        GraphEdge {
            id: EdgeId::new(kind, source, target, &source_handle, &target_handle),
            source,
            target,
            source_handle,
            target_handle,
            kind,
            label,
            file_path,
        }
    }
}
