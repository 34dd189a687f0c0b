//! Graph derivation: one file's declarations → module node plus children
//!
//! Frames are computed bottom-up. A function's frame must enclose its nested
//! functions, so the deepest level is sized first and every parent stacks
//! the already-known frames of its children.

use std::collections::HashMap;

use sprig_core::{
    CodeData, DeclId, ExportHandle, FileDeclarations, FileGraph, FileStatus, FunctionData,
    FunctionDecl, GraphNode, ImportHandle, LayoutConfig, ModuleData, NodeData, NodeId, Position,
    Size,
};

use crate::edges::{ImportLink, export_handle, import_handle, link_import};
use crate::error::DeriveError;

/// Bounding box of a function and its nested children, with the children's
/// offsets relative to the function.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub size: Size,
    pub children: Vec<(DeclId, Position)>,
}

/// Derive the nodes of the file at `path`.
///
/// `links` holds one entry per import, in import order; imports without a
/// link are reported from their own resolution state.
pub fn derive_module_graph(
    path: &str,
    declarations: &FileDeclarations,
    links: &[ImportLink],
    status: FileStatus,
    layout: &LayoutConfig,
) -> Result<FileGraph, DeriveError> {
    validate_nesting(declarations)?;
    let frames = compute_frames(declarations, layout)?;

    let module_id = NodeId::module(path);
    let has_code = !declarations.root_code.trim().is_empty();
    let code_size = layout.estimate_size(&declarations.root_code);
    let content_origin = Position::new(layout.padding, layout.header_height);

    // Top-level column sits right of the code node, if any.
    let column_x = if has_code {
        layout.padding + code_size.width + layout.spacing
    } else {
        layout.padding
    };
    let top: Vec<&FunctionDecl> = declarations.top_level().collect();
    let (offsets, column) = stack_column(&top, &frames, column_x, layout)?;

    let mut width = 0.0_f64;
    let mut height = 0.0_f64;
    if has_code || top.is_empty() {
        width = width.max(layout.padding + code_size.width + layout.padding);
        height = height.max(layout.header_height + code_size.height + layout.padding);
    }
    if let Some(column) = column {
        width = width.max(column_x + column.width + layout.padding);
        height = height.max(layout.header_height + column.height + layout.padding);
    }

    let module = GraphNode {
        id: module_id,
        parent_id: None,
        position: Position::default(),
        size: Size::new(width, height),
        data: NodeData::Module(ModuleData {
            path: path.to_string(),
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            imports: import_handles(declarations, links),
            exports: export_handles(declarations),
            status,
        }),
    };

    let mut children = Vec::with_capacity(declarations.functions.len() + 1);
    if has_code {
        children.push(GraphNode {
            id: NodeId::code(path),
            parent_id: Some(module_id),
            position: content_origin,
            size: code_size,
            data: NodeData::Code(CodeData {
                path: path.to_string(),
                code: declarations.root_code.clone(),
                error: None,
            }),
        });
    }

    let mut positions: HashMap<DeclId, Position> = offsets.into_iter().collect();
    for frame in frames.values() {
        positions.extend(frame.children.iter().copied());
    }

    for function in &declarations.functions {
        let frame = frames.get(&function.id).ok_or(DeriveError::MissingFrame(function.id))?;
        let position = positions
            .get(&function.id)
            .copied()
            .ok_or(DeriveError::MissingFrame(function.id))?;
        let parent_id = match function.parent_id {
            Some(parent) => NodeId::function(path, parent),
            None => module_id,
        };
        children.push(GraphNode {
            id: NodeId::function(path, function.id),
            parent_id: Some(parent_id),
            position,
            size: frame.size,
            data: NodeData::Function(FunctionData {
                path: path.to_string(),
                decl_id: function.id,
                name: function.name.clone(),
                qualified_name: declarations
                    .qualified_name(function.id)
                    .unwrap_or_else(|| function.name.clone()),
                parameters: function.parameters.clone(),
                is_async: function.is_async,
                code: function.body_text.clone(),
                depth: function.depth,
                line: function.span.start_line,
                error: None,
            }),
        });
    }

    tracing::debug!(
        "Derived {} nodes for {} ({} functions, code node: {})",
        children.len() + 1,
        path,
        declarations.functions.len(),
        has_code
    );
    Ok(FileGraph { module, children })
}

/// Every function's parent exists and sits exactly one level up.
pub fn validate_nesting(declarations: &FileDeclarations) -> Result<(), DeriveError> {
    for function in &declarations.functions {
        let expected = match function.parent_id {
            Some(parent) => {
                let parent_decl = declarations.function(parent).ok_or(DeriveError::MissingParent {
                    child: function.id,
                    parent,
                })?;
                parent_decl.depth + 1
            }
            None => 0,
        };
        if function.depth != expected {
            return Err(DeriveError::DepthMismatch {
                id: function.id,
                depth: function.depth,
                expected,
            });
        }
    }
    Ok(())
}

/// Frames for every function, deepest level first.
pub fn compute_frames(
    declarations: &FileDeclarations,
    layout: &LayoutConfig,
) -> Result<HashMap<DeclId, Frame>, DeriveError> {
    let mut frames: HashMap<DeclId, Frame> = HashMap::new();
    let Some(max_depth) = declarations.max_depth() else {
        return Ok(frames);
    };

    for depth in (0..=max_depth).rev() {
        for function in declarations.functions.iter().filter(|f| f.depth == depth) {
            let content = function.content_size;
            let nested: Vec<&FunctionDecl> = declarations.children_of(function.id).collect();
            let column_x = layout.padding + content.width + layout.spacing;
            let (children, column) = stack_column(&nested, &frames, column_x, layout)?;

            let mut width = layout.padding + content.width + layout.padding;
            let mut height = layout.header_height + content.height + layout.padding;
            if let Some(column) = column {
                width = width.max(column_x + column.width + layout.padding);
                height = height.max(layout.header_height + column.height + layout.padding);
            }
            frames.insert(
                function.id,
                Frame {
                    size: Size::new(width, height),
                    children,
                },
            );
        }
    }
    Ok(frames)
}

/// Stack frames vertically at `x`, starting below the header.
/// Returns each frame's offset and the column's bounding size.
fn stack_column(
    functions: &[&FunctionDecl],
    frames: &HashMap<DeclId, Frame>,
    x: f64,
    layout: &LayoutConfig,
) -> Result<(Vec<(DeclId, Position)>, Option<Size>), DeriveError> {
    if functions.is_empty() {
        return Ok((Vec::new(), None));
    }
    let mut offsets = Vec::with_capacity(functions.len());
    let mut y = layout.header_height;
    let mut width = 0.0_f64;
    for function in functions {
        let frame = frames.get(&function.id).ok_or(DeriveError::MissingFrame(function.id))?;
        offsets.push((function.id, Position::new(x, y)));
        y += frame.size.height + layout.spacing;
        width = width.max(frame.size.width);
    }
    let height = y - layout.spacing - layout.header_height;
    Ok((offsets, Some(Size::new(width, height))))
}

pub fn import_handles(declarations: &FileDeclarations, links: &[ImportLink]) -> Vec<ImportHandle> {
    declarations
        .imports
        .iter()
        .enumerate()
        .map(|(i, import)| {
            let link = links
                .get(i)
                .cloned()
                .unwrap_or_else(|| link_import(import, None));
            ImportHandle {
                handle: import_handle(&import.local_name),
                name: import.name.clone(),
                local_name: import.local_name.clone(),
                module_specifier: import.module_specifier.clone(),
                line: import.line,
                status: link.status,
                resolved_full_path: link.resolved_full_path,
            }
        })
        .collect()
}

fn export_handles(declarations: &FileDeclarations) -> Vec<ExportHandle> {
    declarations
        .exports
        .iter()
        .map(|export| ExportHandle {
            handle: export_handle(&export.name),
            name: export.name.clone(),
            is_default: export.is_default,
            line: export.span.start_line,
        })
        .collect()
}
