//! Filesystem watcher feeding external file changes into a workspace

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use globset::GlobSet;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use sprig_core::GraphDiff;
use tokio::sync::{Mutex, broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::io::{is_source_file, relative_path};
use crate::workspace::Workspace;

/// Events emitted by the file watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Removed(PathBuf),
}

/// Recursive watcher over a workspace root.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    event_rx: mpsc::UnboundedReceiver<WatchEvent>,
    watched_paths: HashSet<PathBuf>,
    root_path: PathBuf,
}

impl FileWatcher {
    pub fn new(root_path: impl AsRef<Path>) -> Result<Self> {
        let root_path = root_path.as_ref().to_path_buf();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                debug!("File system event: {:?}", event);
                forward_event(event, &event_tx);
            }
            Err(e) => error!("File system watch error: {}", e),
        })?;

        Ok(Self {
            watcher,
            event_rx,
            watched_paths: HashSet::new(),
            root_path,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    /// Watch the workspace root recursively.
    pub fn watch_root(&mut self) -> Result<()> {
        let root = self.root_path.clone();
        self.watch_directory(root)
    }

    pub fn watch_directory(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        info!("Watching directory: {}", path.display());
        self.watcher.watch(path, RecursiveMode::Recursive)?;
        self.watched_paths.insert(path.to_path_buf());
        Ok(())
    }

    pub fn unwatch(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.watcher.unwatch(path)?;
        self.watched_paths.remove(path);
        Ok(())
    }

    pub fn is_watching(&self, path: &Path) -> bool {
        self.watched_paths.contains(path)
    }

    pub fn event_receiver(&mut self) -> &mut mpsc::UnboundedReceiver<WatchEvent> {
        &mut self.event_rx
    }
}

fn forward_event(event: notify::Event, event_tx: &mpsc::UnboundedSender<WatchEvent>) {
    let wrap: fn(PathBuf) -> WatchEvent = match event.kind {
        notify::EventKind::Create(_) => WatchEvent::Created,
        notify::EventKind::Modify(_) => WatchEvent::Modified,
        notify::EventKind::Remove(_) => WatchEvent::Removed,
        _ => return,
    };
    for path in event.paths {
        if is_hidden_path(&path) {
            continue;
        }
        if let Err(e) = event_tx.send(wrap(path)) {
            warn!("Failed to forward watch event: {}", e);
        }
    }
}

/// Paths under `.git`, `.sprig` or `node_modules` never reach the workspace.
fn is_hidden_path(path: &Path) -> bool {
    path.components().any(|c| {
        matches!(
            c.as_os_str().to_str(),
            Some(".git" | ".sprig" | "node_modules")
        )
    })
}

/// Serialize a diff the way subscribers receive it.
pub fn diff_message(diff: &GraphDiff) -> Result<String> {
    let message = serde_json::json!({ "type": "graph_diff", "diff": diff });
    Ok(serde_json::to_string(&message)?)
}

/// Applies watch events to a shared workspace and broadcasts the resulting
/// diffs.
pub struct WatcherService {
    workspace: Arc<Mutex<Workspace>>,
    root: PathBuf,
    ignore: GlobSet,
    diff_tx: Option<broadcast::Sender<String>>,
}

impl WatcherService {
    pub fn new(workspace: Arc<Mutex<Workspace>>, root: impl Into<PathBuf>, ignore: GlobSet) -> Self {
        Self {
            workspace,
            root: root.into(),
            ignore,
            diff_tx: None,
        }
    }

    pub fn with_broadcast(mut self, diff_tx: broadcast::Sender<String>) -> Self {
        self.diff_tx = Some(diff_tx);
        self
    }

    pub fn workspace(&self) -> &Arc<Mutex<Workspace>> {
        &self.workspace
    }

    /// Drain the watcher's events until its channel closes.
    pub async fn process_events(&self, watcher: &mut FileWatcher) -> Result<()> {
        while let Some(event) = watcher.event_receiver().recv().await {
            if let Err(e) = self.handle_event(event).await {
                error!("Failed to apply watch event: {}", e);
            }
        }
        Ok(())
    }

    /// Apply one event. Returns the diff when the workspace changed.
    pub async fn handle_event(&self, event: WatchEvent) -> Result<Option<GraphDiff>> {
        let (path, removed) = match &event {
            WatchEvent::Created(path) | WatchEvent::Modified(path) => (path, false),
            WatchEvent::Removed(path) => (path, true),
        };
        let Some(relative) = self.tracked_path(path) else {
            return Ok(None);
        };

        // A modify event can trail a delete; treat an unreadable file as gone.
        let text = if removed {
            None
        } else {
            match tokio::fs::read_to_string(path).await {
                Ok(text) => Some(text),
                Err(e) => {
                    debug!("Cannot read {}: {}", path.display(), e);
                    None
                }
            }
        };

        let mut workspace = self.workspace.lock().await;
        let diff = match text {
            Some(text) => {
                if let Some(record) = workspace.file(&relative) {
                    if record.source.saved_text == text {
                        return Ok(None);
                    }
                    if record.source.is_dirty() {
                        warn!("{} changed on disk; discarding unsaved edits", relative);
                    }
                }
                info!("Reloading {}", relative);
                workspace.load_text(&relative, &text)?
            }
            None if workspace.file(&relative).is_some() => workspace.remove_file(&relative)?,
            None => return Ok(None),
        };
        drop(workspace);

        self.broadcast(&diff);
        Ok(Some(diff))
    }

    fn tracked_path(&self, path: &Path) -> Option<String> {
        let relative = relative_path(&self.root, path)?;
        (is_source_file(&relative) && !is_hidden_path(path) && !self.ignore.is_match(&relative))
            .then_some(relative)
    }

    fn broadcast(&self, diff: &GraphDiff) {
        let Some(diff_tx) = &self.diff_tx else {
            return;
        };
        match diff_message(diff) {
            // No receivers just means nobody is listening.
            Ok(message) => {
                let _ = diff_tx.send(message);
            }
            Err(e) => error!("Failed to serialize graph diff: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::FsFileIo;
    use crate::test_utils::create_sample_project;
    use sprig_indexer::SprigConfig;
    use tempfile::TempDir;

    async fn service(root: &Path) -> WatcherService {
        let config = SprigConfig::default();
        let ignore = config.ignore_set().unwrap();
        let mut workspace = Workspace::new(root, &config, Box::new(FsFileIo::new(root, ignore.clone())));
        workspace.load_folder().unwrap();
        WatcherService::new(Arc::new(Mutex::new(workspace)), root, ignore)
    }

    #[tokio::test]
    async fn test_file_watcher_creation() {
        let temp_dir = TempDir::new().unwrap();
        let mut watcher = FileWatcher::new(temp_dir.path()).unwrap();
        watcher.watch_root().unwrap();
        assert!(watcher.is_watching(temp_dir.path()));
    }

    #[tokio::test]
    async fn test_modified_file_is_reloaded_and_broadcast() {
        let temp_dir = create_sample_project();
        let (tx, mut rx) = broadcast::channel(8);
        let service = service(temp_dir.path()).await.with_broadcast(tx);

        let path = temp_dir.path().join("src/math.js");
        std::fs::write(&path, "export function add(a, b) {\n  return b + a;\n}\n").unwrap();
        let diff = service
            .handle_event(WatchEvent::Modified(path))
            .await
            .unwrap()
            .unwrap();
        assert!(!diff.removed_nodes.is_empty());

        let message: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(message["type"], "graph_diff");
        assert_eq!(message["diff"]["sequence"], diff.sequence);
    }

    #[tokio::test]
    async fn test_unchanged_and_untracked_files_are_skipped() {
        let temp_dir = create_sample_project();
        let service = service(temp_dir.path()).await;
        let root = temp_dir.path();

        let same = service.handle_event(WatchEvent::Modified(root.join("src/main.js"))).await.unwrap();
        assert!(same.is_none());

        std::fs::write(root.join("notes.md"), "# notes").unwrap();
        let markdown = service.handle_event(WatchEvent::Created(root.join("notes.md"))).await.unwrap();
        assert!(markdown.is_none());

        let vendored = root.join("node_modules/lib/index.js");
        assert!(service.handle_event(WatchEvent::Modified(vendored)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_removed_file_leaves_graph() {
        let temp_dir = create_sample_project();
        let service = service(temp_dir.path()).await;

        let path = temp_dir.path().join("src/math.js");
        std::fs::remove_file(&path).unwrap();
        let diff = service.handle_event(WatchEvent::Removed(path)).await.unwrap().unwrap();
        assert_eq!(diff.removed_nodes.len(), 3);

        let workspace = service.workspace().lock().await;
        assert!(workspace.file("src/math.js").is_none());
        assert!(workspace.graph().all_nodes().all(|n| n.path() != Some("src/math.js")));
    }

    #[test]
    fn test_hidden_paths() {
        assert!(is_hidden_path(Path::new("/w/node_modules/a.js")));
        assert!(is_hidden_path(Path::new("/w/.sprig/session.json")));
        assert!(!is_hidden_path(Path::new("/w/src/a.js")));
    }
}
