//! Integration tests for Sprig
//!
//! These run the binary and the on-disk workspace together.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use sprig_core::{EdgeKind, ImportStatus, NodeId, snapshot_path};
use sprig_indexer::SprigConfig;
use sprig_watcher::{FsFileIo, Workspace};
use tempfile::TempDir;

fn create_project(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    for (path, content) in files {
        let full = temp_dir.path().join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }
    temp_dir
}

fn sprig(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sprig"))
        .arg("--root")
        .arg(root)
        .args(args)
        .output()
        .expect("Failed to execute sprig")
}

fn open(root: &Path) -> Workspace {
    let config = SprigConfig::load(root).unwrap();
    let io = FsFileIo::new(root, config.ignore_set().unwrap());
    let mut workspace = Workspace::new(root, &config, Box::new(io));
    workspace.load_folder().unwrap();
    workspace
}

#[test]
fn test_cli_invocation() {
    let output = Command::new(env!("CARGO_BIN_EXE_sprig"))
        .arg("--help")
        .output()
        .expect("Failed to execute sprig");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("sprig"));
    assert!(stdout.contains("index"));
    assert!(stdout.contains("watch"));
}

#[test]
fn test_index_prints_graph_json() {
    let project = create_project(&[
        ("src/a.js", "export function foo() {\n  return 1;\n}\n"),
        ("src/b.js", "import { foo } from './a.js';\n\nexport function bar() {\n  return foo();\n}\n"),
    ]);
    let output = sprig(project.path(), &["index", "--json"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let graph: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let nodes = graph["nodes"].as_array().unwrap();
    let edges = graph["edges"].as_array().unwrap();
    assert_eq!(nodes.iter().filter(|n| n["data"]["type"] == "module").count(), 2);
    assert_eq!(nodes.iter().filter(|n| n["data"]["type"] == "function").count(), 2);
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0]["source_handle"], "import-foo");
}

#[test]
fn test_index_save_then_clear() {
    let project = create_project(&[("main.js", "function main() {}\nmain();\n")]);

    let output = sprig(project.path(), &["index", "--save"]);
    assert!(output.status.success());
    assert!(snapshot_path(project.path()).exists());

    let output = sprig(project.path(), &["clear"]);
    assert!(output.status.success());
    assert!(!snapshot_path(project.path()).exists());
}

#[test]
fn test_malformed_config_fails_startup() {
    let project = create_project(&[("sprig.toml", "ignore = 3\n"), ("a.js", "")]);
    let output = sprig(project.path(), &["index"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid sprig.toml"));
}

#[test]
fn test_directory_index_resolves_and_config_ignores() {
    let project = create_project(&[
        ("sprig.toml", "ignore = [\"generated/**\"]\n\n[layout]\nchar_width = 10.0\n"),
        ("src/app.ts", "import { helper } from './foo';\n\nhelper();\n"),
        ("src/foo/index.ts", "export function helper(): number {\n  return 42;\n}\n"),
        ("generated/out.js", "export const x = 1;\n"),
    ]);
    let workspace = open(project.path());

    let paths: Vec<&str> = workspace.paths().collect();
    assert_eq!(paths, vec!["src/app.ts", "src/foo/index.ts"]);

    let module = workspace.graph().node(NodeId::module("src/app.ts")).unwrap();
    let import = &module.as_module().unwrap().imports[0];
    assert_eq!(import.status, ImportStatus::Resolved);
    assert_eq!(import.resolved_full_path.as_deref(), Some("src/foo/index.ts"));
    assert!(workspace.graph().has_edge_between(
        NodeId::module("src/app.ts"),
        NodeId::module("src/foo/index.ts"),
        EdgeKind::ImportExport,
    ));
}

#[test]
fn test_edit_and_save_round_trip() {
    let project = create_project(&[(
        "src/math.js",
        "export function add(a, b) {\n  return a + b;\n}\n",
    )]);
    let mut workspace = open(project.path());
    let add = workspace
        .graph()
        .all_nodes()
        .find(|n| n.as_function().is_some_and(|f| f.name == "add"))
        .map(|n| n.id)
        .unwrap();

    workspace.on_text_change(add, "const sum = a + b;\nreturn sum;").unwrap();
    workspace.save_file("src/math.js").unwrap();

    let on_disk = fs::read_to_string(project.path().join("src/math.js")).unwrap();
    assert_eq!(
        on_disk,
        "export function add(a, b) {\n  const sum = a + b;\n  return sum;\n}\n"
    );

    // A fresh load of the saved file derives the same graph.
    let reopened = open(project.path());
    let mut before: Vec<NodeId> = workspace.graph().all_nodes().map(|n| n.id).collect();
    let mut after: Vec<NodeId> = reopened.graph().all_nodes().map(|n| n.id).collect();
    before.sort();
    after.sort();
    assert_eq!(before, after);
}
