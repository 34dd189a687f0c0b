//! Unit tests for sprig-core

use crate::*;

fn module_node(path: &str) -> GraphNode {
    GraphNode {
        id: NodeId::module(path),
        parent_id: None,
        position: Position::default(),
        size: Size::new(400.0, 300.0),
        data: NodeData::Module(ModuleData {
            path: path.to_string(),
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            imports: Vec::new(),
            exports: Vec::new(),
            status: FileStatus::default(),
        }),
    }
}

fn function_node(path: &str, name: &str, body: &str, parent: NodeId, y: f64) -> GraphNode {
    let decl_id = DeclId::new(name, None, body);
    GraphNode {
        id: NodeId::function(path, decl_id),
        parent_id: Some(parent),
        position: Position::new(16.0, y),
        size: estimate_size(body),
        data: NodeData::Function(FunctionData {
            path: path.to_string(),
            decl_id,
            name: name.to_string(),
            qualified_name: name.to_string(),
            parameters: Vec::new(),
            is_async: false,
            code: body.to_string(),
            depth: 0,
            line: 1,
            error: None,
        }),
    }
}

fn call_edge(path: &str, callee: &GraphNode, caller: &GraphNode, name: &str) -> GraphEdge {
    GraphEdge::new(
        EdgeKind::InternalCall,
        callee.id,
        caller.id,
        "definition".to_string(),
        format!("call-{name}"),
        Some(name.to_string()),
        path.to_string(),
    )
}

#[test]
fn test_decl_id_is_deterministic() {
    let id = DeclId::new("run", None, "return 1;");
    assert_eq!(id, DeclId::new("run", None, "return 1;"));
    assert_ne!(id, DeclId::new("run", None, "return 2;"));
    assert_ne!(id, DeclId::new("run", Some(id), "return 1;"));
    assert_ne!(id, id.with_ordinal(1));
    assert_eq!(id.to_string().len(), 16);
}

#[test]
fn test_node_ids_are_scoped_by_file() {
    let decl = DeclId::new("helper", None, "");
    assert_ne!(NodeId::function("a.js", decl), NodeId::function("b.js", decl));
    assert_ne!(NodeId::module("a.js"), NodeId::code("a.js"));
    assert_eq!(NodeId::module("a.js"), NodeId::module("a.js"));
}

#[test]
fn test_node_data_serializes_with_type_tag() {
    let node = module_node("src/app.js");
    let json = serde_json::to_value(&node).unwrap();
    assert_eq!(json["data"]["type"], "module");
    assert_eq!(json["data"]["path"], "src/app.js");

    let back: GraphNode = serde_json::from_value(json).unwrap();
    assert_eq!(back, node);
}

#[test]
fn test_merge_keeps_positions_of_kept_nodes() {
    let mut graph = Graph::new();
    let module = module_node("a.js");
    let run = function_node("a.js", "run", "go();", module.id, 40.0);
    let stop = function_node("a.js", "stop", "halt();", module.id, 120.0);

    let first = FileGraph {
        module: module.clone(),
        children: vec![run.clone(), stop.clone()],
    };
    let diff = graph.merge_file("a.js", first).unwrap();
    assert_eq!(diff.added_nodes.len(), 3);

    graph.move_node(run.id, Position::new(900.0, 900.0)).unwrap();

    // Same declarations derived again at their computed offsets.
    let second = FileGraph {
        module: module.clone(),
        children: vec![run.clone(), stop.clone()],
    };
    let diff = graph.merge_file("a.js", second).unwrap();
    assert!(diff.is_empty());
    assert_eq!(graph.node(run.id).unwrap().position, Position::new(900.0, 900.0));
}

#[test]
fn test_merge_removes_exactly_the_dropped_declaration() {
    let mut graph = Graph::new();
    let module = module_node("a.js");
    let run = function_node("a.js", "run", "stop();", module.id, 40.0);
    let stop = function_node("a.js", "stop", "halt();", module.id, 120.0);
    let other_module = module_node("b.js");
    let other = function_node("b.js", "other", "", other_module.id, 40.0);

    graph
        .merge_file("a.js", FileGraph { module: module.clone(), children: vec![run.clone(), stop.clone()] })
        .unwrap();
    graph
        .merge_file("b.js", FileGraph { module: other_module.clone(), children: vec![other.clone()] })
        .unwrap();
    graph.move_node(other.id, Position::new(5.0, 5.0)).unwrap();
    graph
        .replace_edges(EdgeKind::InternalCall, Some("a.js"), vec![call_edge("a.js", &stop, &run, "stop")])
        .unwrap();
    assert_eq!(graph.edge_count(), 1);

    let diff = graph
        .merge_file("a.js", FileGraph { module: module.clone(), children: vec![run.clone()] })
        .unwrap();

    assert_eq!(diff.removed_nodes, vec![stop.id]);
    assert_eq!(diff.removed_edges.len(), 1);
    assert!(graph.node(stop.id).is_none());
    assert_eq!(graph.edge_count(), 0);
    assert_eq!(graph.node(other.id).unwrap().position, Position::new(5.0, 5.0));
}

#[test]
fn test_merge_hands_position_to_rewritten_function() {
    let mut graph = Graph::new();
    let module = module_node("a.js");
    let before = function_node("a.js", "run", "go();", module.id, 40.0);
    graph
        .merge_file("a.js", FileGraph { module: module.clone(), children: vec![before.clone()] })
        .unwrap();
    graph.move_node(before.id, Position::new(300.0, 10.0)).unwrap();

    let after = function_node("a.js", "run", "go();\ngo();", module.id, 40.0);
    assert_ne!(before.id, after.id);
    let diff = graph
        .merge_file("a.js", FileGraph { module, children: vec![after.clone()] })
        .unwrap();

    assert_eq!(diff.removed_nodes, vec![before.id]);
    assert_eq!(diff.added_nodes.len(), 1);
    assert_eq!(graph.node(after.id).unwrap().position, Position::new(300.0, 10.0));
}

#[test]
fn test_merge_rejects_orphaned_child() {
    let mut graph = Graph::new();
    let module = module_node("a.js");
    let orphan = function_node("a.js", "run", "", NodeId(42), 0.0);
    let result = graph.merge_file("a.js", FileGraph { module, children: vec![orphan] });
    assert!(matches!(result, Err(GraphError::Invariant(_))));
    assert_eq!(graph.node_count(), 0);
}

#[test]
fn test_remove_file_removes_owned_nodes_only() {
    let mut graph = Graph::new();
    let module = module_node("a.js");
    let run = function_node("a.js", "run", "", module.id, 40.0);
    graph
        .merge_file("a.js", FileGraph { module: module.clone(), children: vec![run.clone()] })
        .unwrap();
    graph.upsert_node(GraphNode {
        id: NodeId::annotation(1),
        parent_id: None,
        position: Position::new(1.0, 2.0),
        size: Size::new(100.0, 40.0),
        data: NodeData::Text(TextData { text: "todo".to_string() }),
    });

    let diff = graph.remove_file("a.js");
    assert_eq!(diff.removed_nodes.len(), 2);
    assert_eq!(graph.node_count(), 1);
    assert!(graph.ancestors(run.id).is_empty());
}

#[test]
fn test_replace_edges_is_scoped_and_validated() {
    let mut graph = Graph::new();
    let a = module_node("a.js");
    let b = module_node("b.js");
    let run = function_node("a.js", "run", "", a.id, 40.0);
    let stop = function_node("a.js", "stop", "", a.id, 40.0);
    graph.merge_file("a.js", FileGraph { module: a.clone(), children: vec![run.clone(), stop.clone()] }).unwrap();
    graph.merge_file("b.js", FileGraph { module: b.clone(), children: vec![] }).unwrap();

    let import = GraphEdge::new(
        EdgeKind::ImportExport,
        b.id,
        a.id,
        "import-run".to_string(),
        "export-run".to_string(),
        Some("run".to_string()),
        "b.js".to_string(),
    );
    graph.replace_edges(EdgeKind::ImportExport, None, vec![import.clone()]).unwrap();
    graph
        .replace_edges(EdgeKind::InternalCall, Some("a.js"), vec![call_edge("a.js", &stop, &run, "stop")])
        .unwrap();
    assert_eq!(graph.edge_count(), 2);

    // Replacing call edges leaves import edges alone.
    let diff = graph.replace_edges(EdgeKind::InternalCall, Some("a.js"), Vec::new()).unwrap();
    assert_eq!(diff.removed_edges.len(), 1);
    assert!(graph.has_edge_between(b.id, a.id, EdgeKind::ImportExport));

    // An edge to a missing node changes nothing.
    let dangling = GraphEdge::new(
        EdgeKind::ImportExport,
        b.id,
        NodeId(7),
        "import-x".to_string(),
        "export-x".to_string(),
        None,
        "b.js".to_string(),
    );
    let result = graph.replace_edges(EdgeKind::ImportExport, None, vec![dangling]);
    assert!(matches!(result, Err(GraphError::MissingEndpoint { .. })));
    assert!(graph.edge(import.id).is_some());
}

#[test]
fn test_diff_engine_sequences() {
    let mut engine = DiffEngine::new();
    let first = engine.stamp(GraphDiff::default());
    let second = engine.stamp(GraphDiff::default());
    assert_eq!(first.sequence, 1);
    assert_eq!(second.sequence, 2);
    assert_eq!(engine.sequence(), 2);
}

#[test]
fn test_snapshot_round_trip() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let mut graph = Graph::new();
    let module = module_node("a.js");
    graph.merge_file("a.js", FileGraph { module: module.clone(), children: vec![] }).unwrap();
    graph.move_node(module.id, Position::new(250.0, 75.0)).unwrap();
    graph.upsert_node(GraphNode {
        id: NodeId::annotation(3),
        parent_id: None,
        position: Position::new(0.0, 0.0),
        size: Size::new(200.0, 80.0),
        data: NodeData::Markdown(MarkdownData { markdown: "# Notes".to_string() }),
    });

    let snapshot = SessionSnapshot::capture(&graph, temp_dir.path());
    save_snapshot(&snapshot, temp_dir.path()).unwrap();
    let loaded = load_snapshot(temp_dir.path()).unwrap().unwrap();
    assert_eq!(loaded, snapshot);

    let mut fresh = Graph::new();
    fresh.merge_file("a.js", FileGraph { module: module.clone(), children: vec![] }).unwrap();
    assert_eq!(loaded.apply(&mut fresh), 1);
    assert_eq!(fresh.node(module.id).unwrap().position, Position::new(250.0, 75.0));
    assert_eq!(fresh.node_count(), 2);

    clear_snapshot(temp_dir.path()).unwrap();
    assert!(load_snapshot(temp_dir.path()).unwrap().is_none());
}

#[test]
fn test_snapshot_falls_back_to_placement_key() {
    let mut graph = Graph::new();
    let module = module_node("a.js");
    let run = function_node("a.js", "run", "function run() {}", module.id, 40.0);
    graph
        .merge_file("a.js", FileGraph { module: module.clone(), children: vec![run.clone()] })
        .unwrap();
    graph.move_node(run.id, Position::new(90.0, 140.0)).unwrap();

    let mut snapshot = SessionSnapshot::capture(&graph, std::path::Path::new("/project"));
    for placement in &mut snapshot.placements {
        if placement.id == run.id {
            placement.id = NodeId(0xdead_beef);
        }
    }

    let mut fresh = Graph::new();
    fresh
        .merge_file("a.js", FileGraph { module: module.clone(), children: vec![run.clone()] })
        .unwrap();
    assert_eq!(snapshot.apply(&mut fresh), 2);
    assert_eq!(fresh.node(run.id).unwrap().position, Position::new(90.0, 140.0));
}

#[test]
fn test_snapshot_without_keys_still_loads() {
    let json = r#"{"version":"0.1.0","root":"/project","saved_at":"now","placements":[{"id":7,"position":{"x":1.0,"y":2.0}}],"annotations":[]}"#;
    let snapshot: SessionSnapshot = serde_json::from_str(json).unwrap();
    assert_eq!(snapshot.placements[0].key, None);
    assert_eq!(snapshot.apply(&mut Graph::new()), 0);
}
