//! Test fixtures for on-disk workspaces

use std::fs;

use tempfile::TempDir;

/// Create a temporary directory holding the given `(path, content)` files.
pub fn create_repo_with_structure(structure: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    for (path, content) in structure {
        let full_path = root.join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&full_path, content).unwrap();
    }

    temp_dir
}

/// A small project with one import between two modules.
pub fn create_sample_project() -> TempDir {
    create_repo_with_structure(&[
        (
            "src/math.js",
            "export function add(a, b) {\n  return a + b;\n}\n\nexport function double(x) {\n  return add(x, x);\n}\n",
        ),
        (
            "src/main.js",
            "import { double } from './math';\n\nfunction run() {\n  console.log(double(21));\n}\n\nrun();\n",
        ),
        ("node_modules/lib/index.js", "module.exports = {};\n"),
    ])
}
