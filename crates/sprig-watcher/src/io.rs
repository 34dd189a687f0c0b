//! File I/O collaborator
//!
//! The workspace never touches the filesystem itself; it goes through a
//! [`FileIo`]. Paths crossing this boundary are root-relative with `/`
//! separators.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::GlobSet;
use ignore::WalkBuilder;
use sprig_indexer::Dialect;

pub trait FileIo: Send {
    fn load_file(&self, path: &str) -> Result<String>;

    fn save_file(&mut self, path: &str, text: &str) -> Result<()>;

    /// Every source file under the root, sorted.
    fn load_folder_tree(&self) -> Result<Vec<String>>;
}

/// Whether a path names a JavaScript or TypeScript source file.
pub fn is_source_file(path: &str) -> bool {
    Dialect::from_path(path).is_some()
}

/// Root-relative, `/`-separated form of `path`.
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

/// Filesystem-backed I/O rooted at a directory.
///
/// Walks with `.gitignore` rules plus the configured ignore globs.
pub struct FsFileIo {
    root: PathBuf,
    ignore: GlobSet,
}

impl FsFileIo {
    pub fn new(root: impl Into<PathBuf>, ignore: GlobSet) -> Self {
        Self {
            root: root.into(),
            ignore,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_ignored(&self, relative: &str) -> bool {
        self.ignore.is_match(relative)
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl FileIo for FsFileIo {
    fn load_file(&self, path: &str) -> Result<String> {
        let full = self.full_path(path);
        std::fs::read_to_string(&full).with_context(|| format!("failed to read {}", full.display()))
    }

    fn save_file(&mut self, path: &str, text: &str) -> Result<()> {
        let full = self.full_path(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(&full, text).with_context(|| format!("failed to write {}", full.display()))
    }

    fn load_folder_tree(&self) -> Result<Vec<String>> {
        let walker = WalkBuilder::new(&self.root)
            .hidden(true)
            .git_ignore(true)
            .require_git(false)
            .follow_links(false)
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let Some(relative) = relative_path(&self.root, entry.path()) else {
                continue;
            };
            if is_source_file(&relative) && !self.is_ignored(&relative) {
                files.push(relative);
            }
        }
        files.sort();
        tracing::debug!("Found {} source files under {}", files.len(), self.root.display());
        Ok(files)
    }
}

/// In-memory I/O, for embedding the workspace without a filesystem.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileIo {
    files: BTreeMap<String, String>,
}

impl MemoryFileIo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files(files: &[(&str, &str)]) -> Self {
        Self {
            files: files
                .iter()
                .map(|(path, text)| (path.to_string(), text.to_string()))
                .collect(),
        }
    }
}

impl FileIo for MemoryFileIo {
    fn load_file(&self, path: &str) -> Result<String> {
        self.files
            .get(path)
            .cloned()
            .with_context(|| format!("no such file: {path}"))
    }

    fn save_file(&mut self, path: &str, text: &str) -> Result<()> {
        self.files.insert(path.to_string(), text.to_string());
        Ok(())
    }

    fn load_folder_tree(&self) -> Result<Vec<String>> {
        Ok(self
            .files
            .keys()
            .filter(|p| is_source_file(p))
            .cloned()
            .collect())
    }
}
