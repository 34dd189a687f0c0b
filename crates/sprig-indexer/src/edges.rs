//! Edge synthesis: import/export edges across files, call edges within one
//!
//! Both edge sets are recomputed from declarations as a whole and handed to
//! the graph store for an atomic swap. Nothing here patches existing edges.

use std::collections::HashSet;

use sprig_core::{
    DeclId, EdgeKind, FileDeclarations, GraphEdge, Import, ImportBinding, ImportStatus, ImportType,
    NodeId,
};

/// Handle name used on the exporting side of a namespace import.
pub const NAMESPACE_EXPORT: &str = "*";

/// How one import binds to the rest of the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportLink {
    pub status: ImportStatus,
    pub resolved_full_path: Option<String>,
    /// Export the import binds to, when `status` is `Resolved`.
    pub export_name: Option<String>,
}

/// Decide the status of one import. `target` holds the declarations of the
/// resolved file, when it was parsed.
pub fn link_import(import: &Import, target: Option<&FileDeclarations>) -> ImportLink {
    let unresolved = |status| ImportLink {
        status,
        resolved_full_path: import.resolved_full_path.clone(),
        export_name: None,
    };

    if import.import_type == ImportType::External {
        return unresolved(ImportStatus::External);
    }
    if import.resolved_full_path.is_none() {
        return unresolved(ImportStatus::MissingFile);
    }
    let Some(target) = target else {
        return unresolved(ImportStatus::MissingExport);
    };

    let export_name = match import.binding {
        ImportBinding::Namespace => {
            (!target.exports.is_empty()).then(|| NAMESPACE_EXPORT.to_string())
        }
        ImportBinding::Default => target
            .default_export()
            .or_else(|| target.export(&import.name))
            .map(|e| e.name.clone()),
        ImportBinding::Named if import.name == "default" => {
            target.default_export().map(|e| e.name.clone())
        }
        ImportBinding::Named => target.export(&import.name).map(|e| e.name.clone()),
    };

    match export_name {
        Some(export_name) => ImportLink {
            status: ImportStatus::Resolved,
            resolved_full_path: import.resolved_full_path.clone(),
            export_name: Some(export_name),
        },
        None => unresolved(ImportStatus::MissingExport),
    }
}

/// Link every import of a file. `lookup` returns the declarations of a
/// loaded, parsed file.
pub fn link_imports<'a>(
    declarations: &FileDeclarations,
    lookup: impl Fn(&str) -> Option<&'a FileDeclarations>,
) -> Vec<ImportLink> {
    declarations
        .imports
        .iter()
        .map(|import| {
            let target = import.resolved_full_path.as_deref().and_then(&lookup);
            link_import(import, target)
        })
        .collect()
}

/// Module-to-module edges for the resolved imports of the file at `importer`.
///
/// At most one edge per (importer, target, imported name).
pub fn import_export_edges(
    importer: &str,
    imports: &[Import],
    links: &[ImportLink],
) -> Vec<GraphEdge> {
    let source = NodeId::module(importer);
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    let mut edges = Vec::new();

    for (import, link) in imports.iter().zip(links) {
        if link.status != ImportStatus::Resolved {
            continue;
        }
        let (Some(target_path), Some(export_name)) =
            (link.resolved_full_path.as_deref(), link.export_name.as_deref())
        else {
            continue;
        };
        if !seen.insert((target_path, import.name.as_str())) {
            continue;
        }
        edges.push(GraphEdge::new(
            EdgeKind::ImportExport,
            source,
            NodeId::module(target_path),
            import_handle(&import.local_name),
            export_handle(export_name),
            Some(import.name.clone()),
            importer.to_string(),
        ));
    }
    edges
}

/// Definition-to-call-site edges among the functions of one file.
///
/// Matches call names against function names; shadowing and aliasing are
/// not tracked. A function calling itself gets no edge.
pub fn call_edges(path: &str, declarations: &FileDeclarations) -> Vec<GraphEdge> {
    let mut seen: HashSet<(DeclId, DeclId, &str)> = HashSet::new();
    let mut edges = Vec::new();

    for caller in &declarations.functions {
        for call in &caller.calls {
            for callee in &declarations.functions {
                if callee.id == caller.id || callee.name != call.name {
                    continue;
                }
                if !seen.insert((callee.id, caller.id, call.name.as_str())) {
                    continue;
                }
                edges.push(GraphEdge::new(
                    EdgeKind::InternalCall,
                    NodeId::function(path, callee.id),
                    NodeId::function(path, caller.id),
                    "definition".to_string(),
                    format!("call-{}", call.name),
                    Some(call.name.clone()),
                    path.to_string(),
                ));
            }
        }
    }
    edges
}

pub fn import_handle(local_name: &str) -> String {
    format!("import-{local_name}")
}

pub fn export_handle(export_name: &str) -> String {
    format!("export-{export_name}")
}
