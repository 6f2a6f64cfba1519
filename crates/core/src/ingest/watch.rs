use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Events emitted while watching a data directory.
#[derive(Debug)]
pub enum WatchEvent {
    /// Files were created, modified or removed.
    Changed(Vec<PathBuf>),
    /// The underlying watcher reported a failure.
    Error(anyhow::Error),
}

/// Watches a data directory and forwards changes to a channel.
///
/// Watching stops when the value is dropped.
pub struct DataWatcher {
    root: PathBuf,
    _watcher: RecommendedWatcher,
}

impl DataWatcher {
    /// Start watching `root` recursively.
    pub fn spawn(root: impl AsRef<Path>, sender: mpsc::Sender<WatchEvent>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
            let event = match result {
                Ok(event) if is_content_change(&event.kind) => WatchEvent::Changed(event.paths),
                Ok(event) => {
                    debug!(kind = ?event.kind, "Ignoring filesystem event");
                    return;
                }
                Err(err) => WatchEvent::Error(err.into()),
            };
            // the receiver going away simply ends the watch
            let _ = sender.blocking_send(event);
        })
        .context("failed to create filesystem watcher")?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch {}", root.display()))?;
        info!("watching {} for changes", root.display());

        Ok(Self {
            root,
            _watcher: watcher,
        })
    }

    /// Directory being watched.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}
