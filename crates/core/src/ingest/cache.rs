use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

/// Caller-owned cache of parsed JSON arrays keyed by file path.
///
/// An entry is reused only while the file's modification time matches the one seen
/// when it was read. Clones share the same storage.
#[derive(Clone, Default)]
pub struct RecordCache {
    inner: Arc<RwLock<HashMap<PathBuf, Entry>>>,
}

struct Entry {
    modified: SystemTime,
    rows: Arc<Vec<Value>>,
}

impl RecordCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows of the JSON array stored at `path`, re-reading the file if it changed.
    pub fn rows(&self, path: impl AsRef<Path>) -> Result<Arc<Vec<Value>>> {
        let path = path.as_ref();
        let modified = fs::metadata(path)
            .and_then(|meta| meta.modified())
            .with_context(|| format!("failed to stat {}", path.display()))?;

        if let Some(entry) = self.inner.read().get(path) {
            if entry.modified == modified {
                return Ok(Arc::clone(&entry.rows));
            }
        }

        debug!(path = %path.display(), "Reading record file");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let value: Value = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        let rows = match value {
            Value::Array(rows) => Arc::new(rows),
            _ => anyhow::bail!("{} does not contain a JSON array", path.display()),
        };

        self.inner.write().insert(
            path.to_path_buf(),
            Entry {
                modified,
                rows: Arc::clone(&rows),
            },
        );
        Ok(rows)
    }

    /// Drop the entry for `path`, forcing the next read to hit the disk.
    pub fn invalidate(&self, path: impl AsRef<Path>) {
        self.inner.write().remove(path.as_ref());
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.inner.write().clear();
    }

    /// Number of cached files.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
