//! Function body normalization
//!
//! A function's "own statements" are its body minus nested function
//! declarations and function-valued variable declarations: the code a user
//! edits directly for that function. Edits flow back by wrapping the edited
//! text in a synthetic function, reparsing it, and splicing the accepted
//! statements into the file next to the nested declarations that were
//! stripped.

use std::ops::Range;

use sprig_core::Span;
use tree_sitter::{Node, Point};

use crate::error::DeriveError;
use crate::parser::{Dialect, ParseFailure, ParsedSource, TreeParser};

/// Node kinds that are function declarations (statements).
pub(crate) const FUNCTION_DECLARATIONS: &[&str] =
    &["function_declaration", "generator_function_declaration"];

/// Node kinds that are function values.
pub(crate) const FUNCTION_EXPRESSIONS: &[&str] = &[
    "arrow_function",
    "function_expression",
    "function",
    "generator_function",
];

pub(crate) fn is_function_declaration(node: Node<'_>) -> bool {
    FUNCTION_DECLARATIONS.contains(&node.kind())
}

pub(crate) fn is_function_expression(node: Node<'_>) -> bool {
    FUNCTION_EXPRESSIONS.contains(&node.kind())
}

pub(crate) fn is_function_like(node: Node<'_>) -> bool {
    is_function_declaration(node) || is_function_expression(node)
}

/// The own statements of one body, as text, plus where the stripped nested
/// declarations sit in the source.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OwnStatements {
    /// Statement texts in source order, continuation lines dedented.
    pub statements: Vec<String>,
    /// Byte ranges of the stripped statements.
    pub stripped: Vec<Range<usize>>,
    /// Every statement text in source order, stripped ones included.
    pub body: Vec<String>,
    /// The body was a concise arrow expression wrapped as `return expr;`.
    pub synthesized: bool,
}

impl OwnStatements {
    pub fn text(&self) -> String {
        self.statements.join("\n")
    }

    /// The whole body as written, nested declarations included.
    pub fn body_text(&self) -> String {
        self.body.join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Whether a statement only introduces functions, and so is shown as its own
/// graph node rather than as code of the enclosing body.
pub fn is_function_statement(node: Node<'_>) -> bool {
    match node.kind() {
        "function_declaration" | "generator_function_declaration" => true,
        "lexical_declaration" | "variable_declaration" => {
            let mut cursor = node.walk();
            let declarators: Vec<Node<'_>> = node
                .named_children(&mut cursor)
                .filter(|c| c.kind() == "variable_declarator")
                .collect();
            !declarators.is_empty()
                && declarators.iter().all(|d| {
                    d.child_by_field_name("value")
                        .is_some_and(is_function_expression)
                })
        }
        "export_statement" => {
            if let Some(declaration) = node.child_by_field_name("declaration") {
                return is_function_statement(declaration);
            }
            node.child_by_field_name("value")
                .is_some_and(is_function_expression)
        }
        "expression_statement" => node
            .named_child(0)
            .filter(|e| e.kind() == "assignment_expression")
            .and_then(|e| e.child_by_field_name("right"))
            .is_some_and(is_function_expression),
        _ => false,
    }
}

/// Own statements of a block (`statement_block` or `program`).
pub fn own_statements(source: &ParsedSource, block: Node<'_>) -> OwnStatements {
    let mut own = OwnStatements::default();
    let mut cursor = block.walk();
    for statement in block.named_children(&mut cursor) {
        let text = statement_text(source, statement);
        if is_function_statement(statement) {
            own.stripped.push(statement.byte_range());
        } else {
            own.statements.push(text.clone());
        }
        own.body.push(text);
    }
    own
}

/// Own statements of a function node, synthesizing a block for a concise
/// arrow body.
pub fn extract_own_statements(source: &ParsedSource, function: Node<'_>) -> OwnStatements {
    let Some(body) = function.child_by_field_name("body") else {
        return OwnStatements::default();
    };
    if body.kind() == "statement_block" {
        return own_statements(source, body);
    }
    let statement = format!("return {};", statement_text(source, body));
    OwnStatements {
        statements: vec![statement.clone()],
        stripped: Vec::new(),
        body: vec![statement],
        synthesized: true,
    }
}

/// Wrap edited body text in a synthetic function, reparse, and return its
/// own statements. Fails without side effects when the wrapped text does not
/// parse.
pub fn reconstruct_wrapper(
    parser: &mut TreeParser,
    text: &str,
    is_async: bool,
    dialect: Dialect,
) -> Result<OwnStatements, ParseFailure> {
    let prefix = if is_async { "async " } else { "" };
    let wrapped = format!("{prefix}function temp() {{\n{text}\n}}");
    let parsed = parser.parse_with(&wrapped, dialect).map_err(|mut failure| {
        // Report positions relative to the edited text.
        failure.line = failure.line.saturating_sub(1);
        failure.text = text.to_string();
        failure
    })?;

    // The wrapper must still be one function whose body closes at the final
    // brace; otherwise the text closed it early (e.g. `} function x() {`).
    let root = parsed.root();
    let mut cursor = root.walk();
    let top: Vec<Node<'_>> = root.named_children(&mut cursor).collect();
    let body = match top.as_slice() {
        [function] if function.kind() == "function_declaration" => function
            .child_by_field_name("name")
            .filter(|name| parsed.node_text(*name) == "temp")
            .and(function.child_by_field_name("body"))
            .filter(|body| body.end_byte() == wrapped.len()),
        _ => None,
    };
    match body {
        Some(body) => Ok(own_statements(&parsed, body)),
        None => Err(ParseFailure {
            message: "edited text escapes the function body".to_string(),
            line: 0,
            column: 0,
            text: text.to_string(),
        }),
    }
}

/// Find the function node a declaration was extracted from.
pub fn find_function_node<'t>(source: &'t ParsedSource, span: Span) -> Option<Node<'t>> {
    let start = Point::new(span.start_line.saturating_sub(1) as usize, span.start_col as usize);
    let end = Point::new(span.end_line.saturating_sub(1) as usize, span.end_col as usize);
    let mut node = source.root().descendant_for_point_range(start, end)?;
    loop {
        if is_function_like(node) && node.start_position() == start && node.end_position() == end {
            return Some(node);
        }
        node = node.parent()?;
    }
}

/// Rebuild the file text with a function's own statements replaced.
///
/// The new body holds the stripped nested declarations first, in their
/// original order, then the edited statements, so hoisting keeps every
/// nested function reachable from the edited code.
pub fn splice_function_body(
    source: &ParsedSource,
    span: Span,
    own_text: &str,
) -> Result<String, DeriveError> {
    let function = find_function_node(source, span).ok_or(DeriveError::MissingTreeNode {
        line: span.start_line,
        column: span.start_col,
    })?;
    let body = function
        .child_by_field_name("body")
        .ok_or(DeriveError::MissingTreeNode {
            line: span.start_line,
            column: span.start_col,
        })?;

    let stripped = if body.kind() == "statement_block" {
        own_statements(source, body).stripped
    } else {
        Vec::new()
    };

    let indent = line_indent(&source.text, function.start_byte());
    let inner = format!("{indent}  ");
    let mut parts: Vec<String> = stripped
        .iter()
        .map(|range| range_text(source, range.clone()))
        .collect();
    if !own_text.trim().is_empty() {
        parts.push(own_text.trim_end().to_string());
    }

    let block = if parts.is_empty() {
        "{}".to_string()
    } else {
        let lines: Vec<String> = parts.iter().map(|p| reindent(p, &inner)).collect();
        format!("{{\n{}\n{indent}}}", lines.join("\n"))
    };

    let range = body.byte_range();
    let mut text = String::with_capacity(source.text.len() + own_text.len());
    text.push_str(&source.text[..range.start]);
    text.push_str(&block);
    text.push_str(&source.text[range.end..]);
    Ok(text)
}

/// Rebuild the file text with the program's own statements replaced.
pub fn splice_root_code(source: &ParsedSource, own_text: &str) -> String {
    let stripped = own_statements(source, source.root()).stripped;
    let mut parts: Vec<String> = stripped
        .into_iter()
        .map(|range| range_text(source, range))
        .collect();
    if !own_text.trim().is_empty() {
        parts.push(own_text.trim_end().to_string());
    }
    let mut text = parts.join("\n\n");
    text.push('\n');
    text
}

fn statement_text(source: &ParsedSource, node: Node<'_>) -> String {
    dedent(source.node_text(node), node.start_position().column)
}

fn range_text(source: &ParsedSource, range: Range<usize>) -> String {
    let column = range.start - line_start(&source.text, range.start);
    dedent(&source.text[range], column)
}

/// Strip up to `column` leading blanks from every line after the first.
pub(crate) fn dedent(text: &str, column: usize) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
            let blanks = line.len() - line.trim_start_matches([' ', '\t']).len();
            out.push_str(&line[blanks.min(column)..]);
        } else {
            out.push_str(line);
        }
    }
    out
}

fn reindent(text: &str, indent: &str) -> String {
    text.split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{indent}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn line_start(text: &str, offset: usize) -> usize {
    text[..offset].rfind('\n').map_or(0, |i| i + 1)
}

fn line_indent(text: &str, offset: usize) -> &str {
    let start = line_start(text, offset);
    let line = &text[start..];
    let blanks = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..blanks]
}
