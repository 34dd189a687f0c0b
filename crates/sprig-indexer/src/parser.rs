//! Tree-sitter parser wrapper for JavaScript and TypeScript sources
//!
//! Parsing never panics and never returns a tree containing syntax errors:
//! tree-sitter recovers from malformed input by inserting `ERROR`/`MISSING`
//! nodes, and any such node turns the result into a [`ParseFailure`] so the
//! caller can keep its previous state.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use tree_sitter::{Language, Node, Parser, Tree};

/// Grammar used for a source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// JavaScript with JSX.
    JavaScript,
    TypeScript,
    /// TypeScript with JSX; also the default for text without a path.
    Tsx,
}

impl Dialect {
    /// Determine dialect from file extension
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = path.rsplit_once('.').map(|(_, ext)| ext)?;
        match ext {
            "js" | "jsx" | "mjs" | "cjs" => Some(Dialect::JavaScript),
            "ts" | "mts" | "cts" => Some(Dialect::TypeScript),
            "tsx" => Some(Dialect::Tsx),
            _ => None,
        }
    }

    /// Get the tree-sitter language for this dialect
    pub fn language(&self) -> Language {
        match self {
            Dialect::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Dialect::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Dialect::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }
}

/// Source text did not parse. Carries the offending text so callers can keep
/// showing it while leaving derived state untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ParseFailure {
    pub message: String,
    /// 1-based line of the first error.
    pub line: u32,
    /// 0-based column of the first error.
    pub column: u32,
    pub text: String,
}

impl ParseFailure {
    fn without_location(message: impl Into<String>, text: &str) -> Self {
        ParseFailure {
            message: message.into(),
            line: 0,
            column: 0,
            text: text.to_string(),
        }
    }
}

/// Source text together with its error-free syntax tree.
#[derive(Debug, Clone)]
pub struct ParsedSource {
    pub text: String,
    pub tree: Tree,
    pub dialect: Dialect,
}

impl ParsedSource {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Source text covered by `node`.
    pub fn node_text(&self, node: Node<'_>) -> &str {
        &self.text[node.byte_range()]
    }
}

/// Default number of distinct texts kept by the parse cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Parses text into trees, one tree-sitter parser per dialect.
///
/// Identical text is served from a cache keyed by the exact text; the cache
/// is an optimization only and is dropped wholesale once full.
pub struct TreeParser {
    parsers: HashMap<Dialect, Parser>,
    cache: HashMap<(Dialect, u64), (String, Tree)>,
    capacity: usize,
}

impl TreeParser {
    pub fn new() -> Self {
        Self::with_cache_capacity(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_cache_capacity(capacity: usize) -> Self {
        TreeParser {
            parsers: HashMap::new(),
            cache: HashMap::new(),
            capacity,
        }
    }

    /// Parse text of unknown origin with the widest grammar (TSX).
    pub fn parse(&mut self, text: &str) -> Result<ParsedSource, ParseFailure> {
        self.parse_with(text, Dialect::Tsx)
    }

    /// Parse a file's text, choosing the dialect from its path.
    pub fn parse_file(&mut self, path: &str, text: &str) -> Result<ParsedSource, ParseFailure> {
        let dialect = Dialect::from_path(path).unwrap_or(Dialect::Tsx);
        self.parse_with(text, dialect)
    }

    pub fn parse_with(&mut self, text: &str, dialect: Dialect) -> Result<ParsedSource, ParseFailure> {
        let key = (dialect, text_hash(text));
        if let Some((cached_text, tree)) = self.cache.get(&key) {
            if cached_text == text {
                tracing::trace!("Parse cache hit ({} bytes)", text.len());
                return Ok(ParsedSource {
                    text: text.to_string(),
                    tree: tree.clone(),
                    dialect,
                });
            }
        }

        let tree = self.parse_uncached(text, dialect)?;
        if let Some(error) = first_error(tree.root_node()) {
            return Err(describe_error(error, text));
        }

        if self.capacity > 0 {
            if self.cache.len() >= self.capacity {
                self.cache.clear();
            }
            self.cache.insert(key, (text.to_string(), tree.clone()));
        }

        Ok(ParsedSource {
            text: text.to_string(),
            tree,
            dialect,
        })
    }

    fn parse_uncached(&mut self, text: &str, dialect: Dialect) -> Result<Tree, ParseFailure> {
        if !self.parsers.contains_key(&dialect) {
            let mut parser = Parser::new();
            parser.set_language(&dialect.language()).map_err(|e| {
                ParseFailure::without_location(format!("failed to load {dialect:?} grammar: {e}"), text)
            })?;
            self.parsers.insert(dialect, parser);
        }

        let Some(parser) = self.parsers.get_mut(&dialect) else {
            return Err(ParseFailure::without_location("parser unavailable", text));
        };
        parser
            .parse(text, None)
            .ok_or_else(|| ParseFailure::without_location("parser produced no tree", text))
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }
}

impl Default for TreeParser {
    fn default() -> Self {
        Self::new()
    }
}

fn text_hash(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

/// First `ERROR` or `MISSING` node in document order.
fn first_error(root: Node<'_>) -> Option<Node<'_>> {
    if !root.has_error() {
        return None;
    }
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        if !node.has_error() {
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        for child in children.into_iter().rev() {
            stack.push(child);
        }
    }
    // has_error() without a locatable node: report the root.
    Some(root)
}

fn describe_error(node: Node<'_>, text: &str) -> ParseFailure {
    let point = node.start_position();
    let line = point.row as u32 + 1;
    let column = point.column as u32;
    let message = if node.is_missing() {
        format!("missing `{}` at line {line}, column {column}", node.kind())
    } else {
        format!("syntax error at line {line}, column {column}")
    };
    ParseFailure {
        message,
        line,
        column,
        text: text.to_string(),
    }
}
