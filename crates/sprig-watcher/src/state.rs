//! Per-file state machine
//!
//! [`reduce`] maps a file record and an event to the next record. It never
//! touches the graph; the workspace applies the result in a single merge, so
//! a rejected edit cannot leave derived state half updated.

use std::collections::BTreeMap;

use sprig_core::{FileDeclarations, FileStatus, LayoutConfig, NodeId};
use sprig_indexer::{
    ParseFailure, ParsedSource, TreeParser, extract_with, reconstruct_wrapper, splice_function_body,
    splice_root_code,
};

use crate::error::{EditError, SessionError};

/// A file's text as loaded and as last written back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub raw_text: String,
    pub saved_text: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            path: path.into(),
            raw_text: text.clone(),
            saved_text: text,
        }
    }

    /// Unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.raw_text != self.saved_text
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileState {
    /// Text is loaded but has never parsed.
    Loaded { error: Option<ParseFailure> },
    Parsed,
    /// The latest text did not parse; the last parsed state stands.
    Dirty { error: ParseFailure },
}

impl FileState {
    pub fn error(&self) -> Option<&ParseFailure> {
        match self {
            FileState::Loaded { error } => error.as_ref(),
            FileState::Parsed => None,
            FileState::Dirty { error } => Some(error),
        }
    }
}

/// Node text the user typed that has not parsed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEdit {
    pub text: String,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct FileRecord {
    pub source: SourceFile,
    pub state: FileState,
    /// Last text that parsed, with its tree.
    pub parsed: Option<ParsedSource>,
    /// Declarations of `parsed`.
    pub declarations: Option<FileDeclarations>,
    pub pending: BTreeMap<NodeId, PendingEdit>,
}

impl FileRecord {
    fn new(path: &str, text: &str) -> Self {
        Self {
            source: SourceFile::new(path, text),
            state: FileState::Loaded { error: None },
            parsed: None,
            declarations: None,
            pending: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.source.path
    }

    pub fn status(&self) -> FileStatus {
        FileStatus {
            dirty: self.source.is_dirty(),
            parse_error: self.state.error().map(|e| e.message.clone()),
        }
    }

    /// Whether a node id names a declaration of the current parse.
    fn owns_function(&self, node: NodeId) -> bool {
        self.declarations.as_ref().is_some_and(|decls| {
            decls
                .functions
                .iter()
                .any(|f| NodeId::function(&self.source.path, f.id) == node)
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileEvent {
    /// Text read from disk. Sets both the raw and the saved text.
    Loaded(String),
    /// The code of one function or code node was edited.
    TextEdited { node: NodeId, text: String },
    /// The whole file text was replaced.
    FileTextReplaced(String),
    Saved,
    Removed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The text parsed and declarations were recomputed.
    Rederived,
    /// Only text or save status changed.
    StatusChanged,
    /// The text did not parse; declarations are unchanged.
    Rejected(ParseFailure),
    Removed,
}

#[derive(Debug, Clone)]
pub struct Transition {
    /// Next record; `None` once the file is removed.
    pub file: Option<FileRecord>,
    pub outcome: Outcome,
}

/// Compute the next state of the file at `path`.
///
/// `parser` is only used for its parse cache; equal inputs always produce
/// equal transitions.
pub fn reduce(
    parser: &mut TreeParser,
    layout: &LayoutConfig,
    path: &str,
    current: Option<&FileRecord>,
    event: FileEvent,
) -> Result<Transition, SessionError> {
    let unknown = || SessionError::UnknownFile(path.to_string());
    match event {
        FileEvent::Loaded(text) => {
            let record = current
                .cloned()
                .unwrap_or_else(|| FileRecord::new(path, &text));
            let mut transition = reparse(parser, layout, record, text.clone());
            if let Some(file) = transition.file.as_mut() {
                file.source.saved_text = text;
            }
            Ok(transition)
        }
        FileEvent::FileTextReplaced(text) => {
            let record = current.ok_or_else(unknown)?.clone();
            Ok(reparse(parser, layout, record, text))
        }
        FileEvent::TextEdited { node, text } => {
            let record = current.ok_or_else(unknown)?;
            edit_node(parser, layout, record, node, text)
        }
        FileEvent::Saved => {
            let mut record = current.ok_or_else(unknown)?.clone();
            record.source.saved_text = record.source.raw_text.clone();
            Ok(Transition {
                file: Some(record),
                outcome: Outcome::StatusChanged,
            })
        }
        FileEvent::Removed => {
            current.ok_or_else(unknown)?;
            Ok(Transition {
                file: None,
                outcome: Outcome::Removed,
            })
        }
    }
}

/// Replace the file text and parse it.
fn reparse(
    parser: &mut TreeParser,
    layout: &LayoutConfig,
    mut record: FileRecord,
    text: String,
) -> Transition {
    record.source.raw_text = text;
    match parser.parse_file(&record.source.path, &record.source.raw_text) {
        Ok(parsed) => {
            record.declarations = Some(extract_with(&parsed, layout));
            record.parsed = Some(parsed);
            record.state = FileState::Parsed;
            record.pending.clear();
            Transition {
                file: Some(record),
                outcome: Outcome::Rederived,
            }
        }
        Err(failure) => {
            tracing::warn!("{} does not parse: {}", record.source.path, failure);
            record.state = if record.parsed.is_some() {
                FileState::Dirty {
                    error: failure.clone(),
                }
            } else {
                FileState::Loaded {
                    error: Some(failure.clone()),
                }
            };
            Transition {
                file: Some(record),
                outcome: Outcome::Rejected(failure),
            }
        }
    }
}

/// Splice an edited node's text into the file and reparse the whole file.
fn edit_node(
    parser: &mut TreeParser,
    layout: &LayoutConfig,
    record: &FileRecord,
    node: NodeId,
    text: String,
) -> Result<Transition, SessionError> {
    let path = record.path();
    let (Some(parsed), Some(declarations)) = (&record.parsed, &record.declarations) else {
        return Err(EditError::FileNotParsed(path.to_string()).into());
    };

    let spliced = if node == NodeId::code(path) {
        Ok(splice_root_code(parsed, &text))
    } else if node == NodeId::module(path) {
        return Err(EditError::NotEditable(node).into());
    } else {
        let function = declarations
            .functions
            .iter()
            .find(|f| NodeId::function(path, f.id) == node)
            .ok_or(EditError::UnknownNode(node))?;
        match reconstruct_wrapper(parser, &text, function.is_async, parsed.dialect) {
            Ok(own) => Ok(splice_function_body(parsed, function.span, &own.body_text())?),
            Err(failure) => Err(failure),
        }
    };

    let reparsed = spliced.and_then(|full| {
        let tree = parser.parse_file(path, &full)?;
        Ok((full, tree))
    });

    let mut next = record.clone();
    match reparsed {
        Ok((full, tree)) => {
            tracing::debug!("Applied edit of node {} to {}", node, path);
            next.source.raw_text = full;
            next.declarations = Some(extract_with(&tree, layout));
            next.parsed = Some(tree);
            next.state = FileState::Parsed;
            next.pending.remove(&node);
            let stale: Vec<NodeId> = next
                .pending
                .keys()
                .copied()
                .filter(|id| !next.owns_function(*id) && *id != NodeId::code(path))
                .collect();
            for id in stale {
                next.pending.remove(&id);
            }
            Ok(Transition {
                file: Some(next),
                outcome: Outcome::Rederived,
            })
        }
        Err(failure) => {
            tracing::warn!("Rejected edit of node {} in {}: {}", node, path, failure);
            next.pending.insert(
                node,
                PendingEdit {
                    text,
                    error: failure.message.clone(),
                },
            );
            next.state = FileState::Dirty {
                error: failure.clone(),
            };
            Ok(Transition {
                file: Some(next),
                outcome: Outcome::Rejected(failure),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(parser: &mut TreeParser, path: &str, text: &str) -> FileRecord {
        reduce(parser, &LayoutConfig::default(), path, None, FileEvent::Loaded(text.to_string()))
            .unwrap()
            .file
            .unwrap()
    }

    #[test]
    fn test_load_parses() {
        let mut parser = TreeParser::new();
        let record = load(&mut parser, "a.js", "function a() {}");
        assert_eq!(record.state, FileState::Parsed);
        assert!(!record.source.is_dirty());
        assert_eq!(record.declarations.unwrap().functions.len(), 1);
    }

    #[test]
    fn test_load_failure_stays_loaded() {
        let mut parser = TreeParser::new();
        let record = load(&mut parser, "a.js", "function a( {");
        assert!(matches!(record.state, FileState::Loaded { error: Some(_) }));
        assert!(record.parsed.is_none());
        assert!(record.status().parse_error.is_some());
    }

    #[test]
    fn test_failed_replace_keeps_last_parse() {
        let mut parser = TreeParser::new();
        let layout = LayoutConfig::default();
        let record = load(&mut parser, "a.js", "function a() {}");
        let before = record.declarations.clone();

        let next = reduce(
            &mut parser,
            &layout,
            "a.js",
            Some(&record),
            FileEvent::FileTextReplaced("function a() {".to_string()),
        )
        .unwrap();
        assert!(matches!(next.outcome, Outcome::Rejected(_)));
        let file = next.file.unwrap();
        assert!(matches!(file.state, FileState::Dirty { .. }));
        assert_eq!(file.declarations, before);
        assert_eq!(file.source.raw_text, "function a() {");
        assert!(file.source.is_dirty());
    }

    #[test]
    fn test_save_clears_dirty() {
        let mut parser = TreeParser::new();
        let layout = LayoutConfig::default();
        let record = load(&mut parser, "a.js", "let a = 1;");
        let edited = reduce(&mut parser, &layout, "a.js", Some(&record), FileEvent::FileTextReplaced("let a = 2;".to_string()))
            .unwrap()
            .file
            .unwrap();
        assert!(edited.source.is_dirty());
        let saved = reduce(&mut parser, &layout, "a.js", Some(&edited), FileEvent::Saved).unwrap();
        assert_eq!(saved.outcome, Outcome::StatusChanged);
        assert!(!saved.file.unwrap().source.is_dirty());
    }

    #[test]
    fn test_module_node_is_not_editable() {
        let mut parser = TreeParser::new();
        let record = load(&mut parser, "a.js", "function a() {}");
        let event = FileEvent::TextEdited {
            node: NodeId::module("a.js"),
            text: "x".to_string(),
        };
        let result = reduce(&mut parser, &LayoutConfig::default(), "a.js", Some(&record), event);
        assert!(matches!(result, Err(SessionError::Edit(EditError::NotEditable(_)))));
    }

    #[test]
    fn test_events_on_unknown_file() {
        let mut parser = TreeParser::new();
        let result = reduce(&mut parser, &LayoutConfig::default(), "a.js", None, FileEvent::Saved);
        assert!(matches!(result, Err(SessionError::UnknownFile(_))));
    }
}
