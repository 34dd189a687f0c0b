//! CLI command implementations

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use sprig_core::{GraphEdge, GraphNode, clear_snapshot};
use sprig_indexer::SprigConfig;
use sprig_watcher::{FileWatcher, FsFileIo, WatcherService, Workspace};
use tokio::sync::{Mutex, broadcast};

/// Load the project under `root` with its `sprig.toml`, restoring the saved
/// session if there is one.
fn open_workspace(root: &Path) -> anyhow::Result<(Workspace, SprigConfig)> {
    let config = SprigConfig::load(root)?;
    let io = FsFileIo::new(root, config.ignore_set()?);
    let mut workspace = Workspace::new(root, &config, Box::new(io));
    workspace.load_folder()?;
    if workspace.restore_session()?.is_some() {
        tracing::info!("Restored saved session");
    }
    Ok((workspace, config))
}

pub fn index(root: PathBuf, json: bool, save: bool) -> anyhow::Result<()> {
    tracing::info!("Indexing project: {}", root.display());
    let (workspace, _) = open_workspace(&root)?;

    let graph = workspace.graph();
    let broken = workspace
        .paths()
        .filter_map(|p| workspace.file(p))
        .filter(|f| f.state.error().is_some())
        .count();
    tracing::info!(
        "Indexed {} nodes, {} edges ({} files with parse errors)",
        graph.node_count(),
        graph.edge_count(),
        broken
    );

    if json {
        let mut nodes: Vec<&GraphNode> = graph.all_nodes().collect();
        nodes.sort_by_key(|n| n.id);
        let mut edges: Vec<&GraphEdge> = graph.all_edges().collect();
        edges.sort_by_key(|e| e.id);
        let out = serde_json::json!({ "nodes": nodes, "edges": edges });
        println!("{}", serde_json::to_string_pretty(&out)?);
    }

    if save {
        let path = workspace.save_session()?;
        tracing::info!("Session saved to {}", path.display());
    }
    Ok(())
}

pub async fn watch(root: PathBuf) -> anyhow::Result<()> {
    let (workspace, config) = open_workspace(&root)?;
    tracing::info!(
        "Indexed {} nodes, {} edges",
        workspace.graph().node_count(),
        workspace.graph().edge_count()
    );

    let (diff_tx, mut diff_rx) = broadcast::channel::<String>(64);
    let workspace = Arc::new(Mutex::new(workspace));
    let service = WatcherService::new(Arc::clone(&workspace), &root, config.ignore_set()?)
        .with_broadcast(diff_tx);

    tokio::spawn(async move {
        loop {
            match diff_rx.recv().await {
                Ok(message) => tracing::debug!("{}", message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Dropped {} diff messages", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut watcher = FileWatcher::new(&root)?;
    watcher.watch_root()?;
    tracing::info!("Watching {} (Ctrl-C to stop)", root.display());

    tokio::select! {
        result = service.process_events(&mut watcher) => result?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            let path = workspace.lock().await.save_session()?;
            tracing::info!("Session saved to {}", path.display());
        }
    }
    Ok(())
}

pub fn clear(root: PathBuf) -> anyhow::Result<()> {
    tracing::info!("Clearing saved session for: {}", root.display());
    clear_snapshot(&root)?;
    tracing::info!("Session cleared");
    Ok(())
}
