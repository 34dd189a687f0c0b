//! Import specifier resolution against the loaded file set
//!
//! Paths are workspace-relative strings with `/` separators. The resolver
//! never touches the filesystem; it only asks whether a path is loaded.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use sprig_core::{FileDeclarations, ImportType};

/// Candidate suffixes tried after an exact match, in order. Directory index
/// files win over a bare extension.
pub const RESOLVE_SUFFIXES: &[&str] = &[
    "/index.js",
    "/index.jsx",
    "/index.ts",
    "/index.tsx",
    ".js",
    ".jsx",
    ".ts",
    ".tsx",
];

/// Anything that can answer "is this path loaded?".
pub trait FileLookup {
    fn contains_path(&self, path: &str) -> bool;
}

impl<V> FileLookup for HashMap<String, V> {
    fn contains_path(&self, path: &str) -> bool {
        self.contains_key(path)
    }
}

impl<V> FileLookup for BTreeMap<String, V> {
    fn contains_path(&self, path: &str) -> bool {
        self.contains_key(path)
    }
}

impl FileLookup for HashSet<String> {
    fn contains_path(&self, path: &str) -> bool {
        self.contains(path)
    }
}

impl FileLookup for BTreeSet<String> {
    fn contains_path(&self, path: &str) -> bool {
        self.contains(path)
    }
}

/// Map a target path (specifier already joined to the importer's directory)
/// to a loaded file: exact match first, then each suffix in order.
pub fn resolve<F: FileLookup + ?Sized>(files: &F, path: &str) -> Option<String> {
    if files.contains_path(path) {
        return Some(path.to_string());
    }
    RESOLVE_SUFFIXES
        .iter()
        .map(|suffix| format!("{path}{suffix}"))
        .find(|candidate| files.contains_path(candidate))
}

/// Resolve `specifier` as written in the file at `importer`. Bare package
/// specifiers never resolve.
pub fn resolve_import<F: FileLookup + ?Sized>(
    files: &F,
    importer: &str,
    specifier: &str,
) -> Option<String> {
    let target = import_target_path(importer, specifier)?;
    resolve(files, &target)
}

/// Join a local specifier to the importer's directory and normalize it.
///
/// `/x` is taken relative to the workspace root. Returns `None` for bare
/// specifiers and for paths that climb above the root.
pub fn import_target_path(importer: &str, specifier: &str) -> Option<String> {
    if ImportType::of(specifier) == ImportType::External {
        return None;
    }
    let joined = match specifier.strip_prefix('/') {
        Some(rooted) => rooted.to_string(),
        None => {
            let dir = importer.rsplit_once('/').map_or("", |(dir, _)| dir);
            if dir.is_empty() {
                specifier.to_string()
            } else {
                format!("{dir}/{specifier}")
            }
        }
    };
    normalize_path(&joined)
}

/// Collapse `.` and `..` segments. `None` if `..` escapes the root.
pub fn normalize_path(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

/// Fill `resolved_full_path` for every import of the file at `importer`.
/// Returns how many imports resolved.
pub fn resolve_imports<F: FileLookup + ?Sized>(
    files: &F,
    importer: &str,
    declarations: &mut FileDeclarations,
) -> usize {
    let mut resolved = 0;
    for import in &mut declarations.imports {
        import.resolved_full_path = resolve_import(files, importer, &import.module_specifier);
        if import.resolved_full_path.is_some() {
            resolved += 1;
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(paths: &[&str]) -> BTreeSet<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_exact_match_wins() {
        let files = files(&["src/foo.js", "src/foo.js.js"]);
        assert_eq!(resolve(&files, "src/foo.js"), Some("src/foo.js".to_string()));
    }

    #[test]
    fn test_index_before_extension() {
        let files = files(&["src/foo.js", "src/foo/index.js"]);
        assert_eq!(resolve(&files, "src/foo"), Some("src/foo/index.js".to_string()));
    }

    #[test]
    fn test_extension_order() {
        let files = files(&["a.tsx", "a.ts", "a.jsx"]);
        assert_eq!(resolve(&files, "a"), Some("a.jsx".to_string()));
    }

    #[test]
    fn test_unresolved_is_none() {
        let files = files(&["a.js"]);
        assert_eq!(resolve(&files, "b"), None);
        assert_eq!(resolve_import(&files, "a.js", "react"), None);
    }

    #[test]
    fn test_relative_paths() {
        assert_eq!(import_target_path("src/app/main.js", "./util"), Some("src/app/util".to_string()));
        assert_eq!(import_target_path("src/app/main.js", "../lib/x"), Some("src/lib/x".to_string()));
        assert_eq!(import_target_path("main.js", "./x"), Some("x".to_string()));
        assert_eq!(import_target_path("src/main.js", "/lib/x"), Some("lib/x".to_string()));
        assert_eq!(import_target_path("main.js", "../x"), None);
        assert_eq!(import_target_path("main.js", "lodash"), None);
    }
}
