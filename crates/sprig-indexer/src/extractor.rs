//! Declaration extraction from JavaScript/TypeScript syntax trees
//!
//! Finds a file's imports, exports and addressable functions. Functions are
//! collected by a recursive walk that returns what it found instead of
//! pushing into shared state, so every subtree can be tested in isolation.

use std::collections::HashMap;

use sprig_core::{
    CallSite, DeclId, Export, FileDeclarations, FunctionDecl, Import, ImportBinding, ImportType,
    LayoutConfig, Span,
};
use tree_sitter::Node;

use crate::normalizer::{
    extract_own_statements, is_function_declaration, is_function_expression, own_statements,
};
use crate::parser::ParsedSource;

/// Name given to functions with no resolvable name.
pub const ANONYMOUS: &str = "<anonymous>";

/// Extract declarations using the default layout metrics for content sizes.
pub fn extract(source: &ParsedSource) -> FileDeclarations {
    extract_with(source, &LayoutConfig::default())
}

pub fn extract_with(source: &ParsedSource, layout: &LayoutConfig) -> FileDeclarations {
    let root = source.root();
    let mut ordinals = HashMap::new();
    let functions = collect_functions(source, layout, root, None, &mut ordinals);

    let declarations = FileDeclarations {
        imports: extract_imports(source),
        exports: extract_exports(source),
        functions,
        root_code: own_statements(source, root).text(),
    };
    tracing::trace!(
        "Extracted {} imports, {} exports, {} functions",
        declarations.imports.len(),
        declarations.exports.len(),
        declarations.functions.len()
    );
    declarations
}

/// Whether a function node becomes a declaration of its own.
///
/// Function statements always do. Function values only when bound to a
/// name: a variable declarator, an object property, an assignment target or
/// the module's default export.
pub fn is_captured(node: Node<'_>) -> bool {
    if is_function_declaration(node) {
        return true;
    }
    if !is_function_expression(node) {
        return false;
    }
    let Some(parent) = node.parent() else {
        return false;
    };
    let field = match parent.kind() {
        "variable_declarator" | "pair" | "export_statement" => "value",
        "assignment_expression" => "right",
        _ => return false,
    };
    parent.child_by_field_name(field) == Some(node)
}

#[derive(Clone, Copy)]
struct Enclosing {
    id: DeclId,
    depth: u32,
}

fn collect_functions(
    source: &ParsedSource,
    layout: &LayoutConfig,
    node: Node<'_>,
    parent: Option<Enclosing>,
    ordinals: &mut HashMap<DeclId, usize>,
) -> Vec<FunctionDecl> {
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();

    let mut found = Vec::new();
    for child in children {
        if is_captured(child) {
            found.extend(capture_function(source, layout, child, parent, ordinals));
        } else {
            found.extend(collect_functions(source, layout, child, parent, ordinals));
        }
    }
    found
}

/// The declaration for `node` followed by everything nested inside it.
fn capture_function(
    source: &ParsedSource,
    layout: &LayoutConfig,
    node: Node<'_>,
    parent: Option<Enclosing>,
    ordinals: &mut HashMap<DeclId, usize>,
) -> Vec<FunctionDecl> {
    let name = function_name(source, node);
    let body_text = extract_own_statements(source, node).text();
    let parent_id = parent.map(|p| p.id);

    let base = DeclId::new(&name, parent_id, &body_text);
    let seen = ordinals.entry(base).or_insert(0);
    let id = if *seen == 0 { base } else { base.with_ordinal(*seen) };
    *seen += 1;

    let scope = Enclosing {
        id,
        depth: parent.map_or(0, |p| p.depth + 1),
    };
    let nested = match node.child_by_field_name("body") {
        Some(body) => collect_functions(source, layout, body, Some(scope), ordinals),
        None => Vec::new(),
    };

    let declaration = FunctionDecl {
        id,
        name,
        span: span_of(node),
        depth: scope.depth,
        parent_id,
        parameters: parameters(source, node),
        is_async: has_token(node, "async"),
        content_size: layout.estimate_size(&body_text),
        body_text,
        nested_function_ids: nested
            .iter()
            .filter(|f| f.parent_id == Some(id))
            .map(|f| f.id)
            .collect(),
        calls: own_calls(source, node),
    };

    let mut result = Vec::with_capacity(nested.len() + 1);
    result.push(declaration);
    result.extend(nested);
    result
}

/// Own name, then the binding it is assigned to, then `<anonymous>`.
fn function_name(source: &ParsedSource, node: Node<'_>) -> String {
    if let Some(name) = node.child_by_field_name("name") {
        return source.node_text(name).to_string();
    }
    let Some(parent) = node.parent() else {
        return ANONYMOUS.to_string();
    };
    let bound = match parent.kind() {
        "variable_declarator" => parent
            .child_by_field_name("name")
            .filter(|n| n.kind() == "identifier")
            .map(|n| source.node_text(n).to_string()),
        "pair" => parent
            .child_by_field_name("key")
            .map(|k| unquote(source.node_text(k))),
        "assignment_expression" => {
            parent
                .child_by_field_name("left")
                .and_then(|left| match left.kind() {
                    "identifier" => Some(source.node_text(left).to_string()),
                    "member_expression" => left
                        .child_by_field_name("property")
                        .map(|p| source.node_text(p).to_string()),
                    _ => None,
                })
        }
        "export_statement" => Some("default".to_string()),
        _ => None,
    };
    bound.unwrap_or_else(|| ANONYMOUS.to_string())
}

fn parameters(source: &ParsedSource, node: Node<'_>) -> Vec<String> {
    if let Some(single) = node.child_by_field_name("parameter") {
        return vec![source.node_text(single).to_string()];
    }
    let Some(list) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut cursor = list.walk();
    list.named_children(&mut cursor)
        .filter(|p| p.kind() != "comment")
        .map(|p| source.node_text(p).to_string())
        .collect()
}

/// Call sites in a function's own region, skipping nested captured functions.
fn own_calls(source: &ParsedSource, function: Node<'_>) -> Vec<CallSite> {
    let Some(body) = function.child_by_field_name("body") else {
        return Vec::new();
    };
    let mut calls = Vec::new();
    let mut stack = vec![body];
    while let Some(node) = stack.pop() {
        if is_captured(node) {
            continue;
        }
        if node.kind() == "call_expression" {
            if let Some(name) = callee_name(source, node) {
                calls.push(CallSite {
                    name,
                    line: line_of(node),
                });
            }
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    calls
}

/// `f()` → `f`, `obj.method()` → `method`. Anything else has no name.
fn callee_name(source: &ParsedSource, call: Node<'_>) -> Option<String> {
    let callee = call.child_by_field_name("function")?;
    match callee.kind() {
        "identifier" => Some(source.node_text(callee).to_string()),
        "member_expression" => callee
            .child_by_field_name("property")
            .map(|p| source.node_text(p).to_string()),
        _ => None,
    }
}

// ── Imports ───────────────────────────────────────────────

fn extract_imports(source: &ParsedSource) -> Vec<Import> {
    let root = source.root();
    let mut cursor = root.walk();
    let statements: Vec<Node<'_>> = root
        .named_children(&mut cursor)
        .filter(|n| n.kind() == "import_statement")
        .collect();

    let mut imports = Vec::new();
    for statement in statements {
        imports.extend(import_bindings(source, statement));
    }
    imports
}

fn import_bindings(source: &ParsedSource, statement: Node<'_>) -> Vec<Import> {
    let mut cursor = statement.walk();
    let children: Vec<Node<'_>> = statement.named_children(&mut cursor).collect();

    let mut specifier = statement
        .child_by_field_name("source")
        .or_else(|| children.iter().copied().find(|c| c.kind() == "string"))
        .map(|s| unquote(source.node_text(s)));

    let mut bindings: Vec<(String, String, ImportBinding)> = Vec::new();
    for child in children {
        match child.kind() {
            "import_clause" => bindings.extend(clause_bindings(source, child)),
            "import_require_clause" => {
                let mut inner = child.walk();
                let parts: Vec<Node<'_>> = child.named_children(&mut inner).collect();
                if let Some(local) = parts.iter().find(|p| p.kind() == "identifier") {
                    let local = source.node_text(*local).to_string();
                    bindings.push((local.clone(), local, ImportBinding::Default));
                }
                if let Some(string) = parts.iter().find(|p| p.kind() == "string") {
                    specifier = Some(unquote(source.node_text(*string)));
                }
            }
            _ => {}
        }
    }

    let Some(specifier) = specifier else {
        return Vec::new();
    };
    let line = line_of(statement);
    let span = span_of(statement);
    bindings
        .into_iter()
        .map(|(name, local_name, binding)| Import {
            name,
            local_name,
            binding,
            import_type: ImportType::of(&specifier),
            module_specifier: specifier.clone(),
            line,
            span,
            resolved_full_path: None,
        })
        .collect()
}

fn clause_bindings(source: &ParsedSource, clause: Node<'_>) -> Vec<(String, String, ImportBinding)> {
    let mut bindings = Vec::new();
    let mut cursor = clause.walk();
    let parts: Vec<Node<'_>> = clause.named_children(&mut cursor).collect();
    for part in parts {
        match part.kind() {
            "identifier" => {
                let local = source.node_text(part).to_string();
                bindings.push((local.clone(), local, ImportBinding::Default));
            }
            "namespace_import" => {
                let mut inner = part.walk();
                let local = part
                    .named_children(&mut inner)
                    .find(|n| n.kind() == "identifier")
                    .map(|n| source.node_text(n).to_string());
                if let Some(local) = local {
                    bindings.push((local.clone(), local, ImportBinding::Namespace));
                }
            }
            "named_imports" => {
                let mut inner = part.walk();
                let specifiers: Vec<Node<'_>> = part
                    .named_children(&mut inner)
                    .filter(|n| n.kind() == "import_specifier")
                    .collect();
                for specifier in specifiers {
                    let Some(name) = specifier.child_by_field_name("name") else {
                        continue;
                    };
                    let name = unquote(source.node_text(name));
                    let local = specifier
                        .child_by_field_name("alias")
                        .map(|a| source.node_text(a).to_string())
                        .unwrap_or_else(|| name.clone());
                    bindings.push((name, local, ImportBinding::Named));
                }
            }
            _ => {}
        }
    }
    bindings
}

// ── Exports ───────────────────────────────────────────────

fn extract_exports(source: &ParsedSource) -> Vec<Export> {
    let root = source.root();
    let mut cursor = root.walk();
    let statements: Vec<Node<'_>> = root
        .named_children(&mut cursor)
        .filter(|n| n.kind() == "export_statement")
        .collect();

    let mut exports = Vec::new();
    for statement in statements {
        exports.extend(statement_exports(source, statement));
    }
    exports
}

fn statement_exports(source: &ParsedSource, statement: Node<'_>) -> Vec<Export> {
    let span = span_of(statement);
    let is_default = has_token(statement, "default");
    let export = |name: String, is_default: bool| Export {
        name,
        is_default,
        span,
    };

    if let Some(declaration) = statement.child_by_field_name("declaration") {
        return match declaration.kind() {
            "lexical_declaration" | "variable_declaration" => {
                let mut cursor = declaration.walk();
                let declarators: Vec<Node<'_>> = declaration
                    .named_children(&mut cursor)
                    .filter(|d| d.kind() == "variable_declarator")
                    .collect();
                declarators
                    .into_iter()
                    .filter_map(|d| d.child_by_field_name("name"))
                    .flat_map(|pattern| bound_identifiers(source, pattern))
                    .map(|name| export(name, false))
                    .collect()
            }
            _ => {
                let name = declaration
                    .child_by_field_name("name")
                    .map(|n| source.node_text(n).to_string())
                    .unwrap_or_else(|| "default".to_string());
                vec![export(name, is_default)]
            }
        };
    }

    if let Some(value) = statement.child_by_field_name("value") {
        let name = if value.kind() == "identifier" {
            source.node_text(value).to_string()
        } else {
            "default".to_string()
        };
        return vec![export(name, true)];
    }

    let mut exports = Vec::new();
    let mut cursor = statement.walk();
    let children: Vec<Node<'_>> = statement.named_children(&mut cursor).collect();
    for child in children {
        match child.kind() {
            "export_clause" => {
                let mut inner = child.walk();
                let specifiers: Vec<Node<'_>> = child
                    .named_children(&mut inner)
                    .filter(|n| n.kind() == "export_specifier")
                    .collect();
                for specifier in specifiers {
                    let exported = specifier
                        .child_by_field_name("alias")
                        .or_else(|| specifier.child_by_field_name("name"))
                        .map(|n| unquote(source.node_text(n)));
                    if let Some(name) = exported {
                        let is_default = name == "default";
                        exports.push(export(name, is_default));
                    }
                }
            }
            "namespace_export" => {
                let mut inner = child.walk();
                let name = child
                    .named_children(&mut inner)
                    .next()
                    .map(|n| unquote(source.node_text(n)));
                if let Some(name) = name {
                    exports.push(export(name, false));
                }
            }
            _ => {}
        }
    }
    exports
}

/// Identifiers introduced by a binding pattern (`a`, `{ a, b: c }`, `[x, ...y]`).
fn bound_identifiers(source: &ParsedSource, pattern: Node<'_>) -> Vec<String> {
    match pattern.kind() {
        "identifier" | "shorthand_property_identifier_pattern" => {
            vec![source.node_text(pattern).to_string()]
        }
        // `{ key: value }` binds only the value side.
        "pair_pattern" => pattern
            .child_by_field_name("value")
            .map(|v| bound_identifiers(source, v))
            .unwrap_or_default(),
        // `a = 1` binds only the left side.
        "assignment_pattern" | "object_assignment_pattern" => pattern
            .child_by_field_name("left")
            .map(|l| bound_identifiers(source, l))
            .unwrap_or_default(),
        _ => {
            let mut cursor = pattern.walk();
            let children: Vec<Node<'_>> = pattern.named_children(&mut cursor).collect();
            children
                .into_iter()
                .flat_map(|c| bound_identifiers(source, c))
                .collect()
        }
    }
}

// ── Helpers ───────────────────────────────────────────────

fn has_token(node: Node<'_>, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|c| !c.is_named() && c.kind() == token);
    found
}

fn unquote(text: &str) -> String {
    text.trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .to_string()
}

pub(crate) fn line_of(node: Node<'_>) -> u32 {
    node.start_position().row as u32 + 1
}

pub(crate) fn span_of(node: Node<'_>) -> Span {
    let start = node.start_position();
    let end = node.end_position();
    Span {
        start_line: start.row as u32 + 1,
        start_col: start.column as u32,
        end_line: end.row as u32 + 1,
        end_col: end.column as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::TreeParser;

    fn extract_text(text: &str) -> FileDeclarations {
        let source = TreeParser::new().parse(text).unwrap();
        extract(&source)
    }

    fn names(decls: &FileDeclarations) -> Vec<&str> {
        decls.functions.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_callbacks_are_not_captured() {
        let decls = extract_text(
            "items.forEach((item) => { const fmt = (x) => x; log(fmt(item)); });\nsetTimeout(function () {}, 10);",
        );
        // The callback itself is skipped, but its body is still searched.
        assert_eq!(names(&decls), vec!["fmt"]);
        assert_eq!(decls.functions[0].depth, 0);
    }

    #[test]
    fn test_name_tie_break() {
        let decls = extract_text(
            "const api = { 'load': () => 1, save: function store() {} };\nmodule.exports.run = () => {};\nhandler = async () => {};",
        );
        assert_eq!(names(&decls), vec!["load", "store", "run", "handler"]);
        assert!(decls.functions[3].is_async);
    }

    #[test]
    fn test_parameters() {
        let decls = extract_text("function f(a, b = 2, ...rest) {}\nconst g = x => x;\nconst h = (n: number): number => n;");
        assert_eq!(decls.functions[0].parameters, vec!["a", "b = 2", "...rest"]);
        assert_eq!(decls.functions[1].parameters, vec!["x"]);
        assert_eq!(decls.functions[2].parameters, vec!["n: number"]);
    }

    #[test]
    fn test_calls_stop_at_nested_functions() {
        let decls = extract_text(
            "function outer() {\n  setup();\n  api.fetch();\n  function inner() { hidden(); }\n  [1].map(x => wrap(x));\n}",
        );
        let outer = &decls.functions[0];
        let called: Vec<&str> = outer.calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(called, vec!["setup", "fetch", "map", "wrap"]);
        assert_eq!(outer.calls[1].line, 3);
    }

    #[test]
    fn test_duplicate_declarations_get_distinct_ids() {
        let decls = extract_text("function a() {}\nfunction a() {}");
        assert_eq!(decls.functions.len(), 2);
        assert_ne!(decls.functions[0].id, decls.functions[1].id);
        assert_eq!(decls.functions[1].id, decls.functions[0].id.with_ordinal(1));
    }

    #[test]
    fn test_import_bindings() {
        let decls = extract_text(
            "import React, { useState as useS, useEffect } from 'react';\nimport * as utils from './utils';\nimport './styles.css';",
        );
        let summary: Vec<(&str, &str, ImportBinding, ImportType, u32)> = decls
            .imports
            .iter()
            .map(|i| (i.name.as_str(), i.local_name.as_str(), i.binding, i.import_type, i.line))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("React", "React", ImportBinding::Default, ImportType::External, 1),
                ("useState", "useS", ImportBinding::Named, ImportType::External, 1),
                ("useEffect", "useEffect", ImportBinding::Named, ImportType::External, 1),
                ("utils", "utils", ImportBinding::Namespace, ImportType::Local, 2),
            ]
        );
    }

    #[test]
    fn test_export_forms() {
        let decls = extract_text(
            "export function f() {}\nexport const a = 1, { b, c: d } = obj;\nexport class C {}\nexport { x, y as z } from './m';\nexport * as ns from './n';\nexport * from './o';\nexport default 42;",
        );
        let exported: Vec<(&str, bool)> = decls
            .exports
            .iter()
            .map(|e| (e.name.as_str(), e.is_default))
            .collect();
        assert_eq!(
            exported,
            vec![
                ("f", false),
                ("a", false),
                ("b", false),
                ("d", false),
                ("C", false),
                ("x", false),
                ("z", false),
                ("ns", false),
                ("default", true),
            ]
        );
    }

    #[test]
    fn test_default_exports() {
        let named = extract_text("function main() {}\nexport default main;");
        assert_eq!(named.default_export().map(|e| e.name.as_str()), Some("main"));

        let declared = extract_text("export default function app() {}");
        assert_eq!(declared.exports[0].name, "app");
        assert!(declared.exports[0].is_default);
        assert_eq!(names(&declared), vec!["app"]);

        let arrow = extract_text("export default () => 1;");
        assert_eq!(arrow.exports[0].name, "default");
        assert_eq!(names(&arrow), vec!["default"]);
    }

    #[test]
    fn test_root_code_excludes_functions() {
        let decls = extract_text("import a from './a';\nconst run = () => a();\nfunction go() {}\nrun();\n");
        assert_eq!(decls.root_code, "import a from './a';\nrun();");
    }
}
