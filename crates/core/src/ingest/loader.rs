use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tracing::{info, warn};
use walkdir::WalkDir;

use super::{RawRecord, RecordCache};
use crate::models::{Port, Vessel};

/// File holding the port reference set.
pub const PORTS_FILE: &str = "ports.json";
/// File holding the vessel reference set.
pub const VESSELS_FILE: &str = "vessels.json";
/// Directory scanned for operation record files.
pub const RECORDS_DIR: &str = "records";

/// Everything a planning run is computed from.
#[derive(Debug, Clone, Default)]
pub struct PlanningInput {
    /// Port reference data.
    pub ports: Vec<Port>,
    /// Vessel reference data.
    pub vessels: Vec<Vessel>,
    /// Raw operation records in file then row order.
    pub records: Vec<RawRecord>,
}

/// Reads reference data and operation records from a data directory.
///
/// Layout: `ports.json`, `vessels.json` and any number of `*.json` files below
/// `records/`, each holding a JSON array.
#[derive(Clone)]
pub struct DataLoader {
    root: PathBuf,
    cache: RecordCache,
}

impl DataLoader {
    /// Loader rooted at `root`, reading through `cache`.
    pub fn new(root: impl Into<PathBuf>, cache: RecordCache) -> Self {
        Self {
            root: root.into(),
            cache,
        }
    }

    /// Data directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Cache backing this loader.
    pub fn cache(&self) -> &RecordCache {
        &self.cache
    }

    /// Load a full planning input. Any unreadable or malformed file fails the whole load.
    pub fn load(&self) -> Result<PlanningInput> {
        if !self.root.is_dir() {
            anyhow::bail!("data directory missing: {}", self.root.display());
        }

        let ports: Vec<Port> = self.reference_set(PORTS_FILE)?;
        let vessels: Vec<Vessel> = self.reference_set(VESSELS_FILE)?;

        let mut records = Vec::new();
        for path in self.record_files()? {
            let origin = path
                .strip_prefix(&self.root)
                .unwrap_or(&path)
                .display()
                .to_string();
            let rows = self.cache.rows(&path)?;
            records.extend(
                rows.iter()
                    .enumerate()
                    .map(|(index, row)| RawRecord::from_value(origin.clone(), index, row.clone())),
            );
        }

        info!(
            root = %self.root.display(),
            ports = ports.len(),
            vessels = vessels.len(),
            records = records.len(),
            "Planning input loaded"
        );
        Ok(PlanningInput {
            ports,
            vessels,
            records,
        })
    }

    /// Record files below `records/`, sorted by path.
    pub fn record_files(&self) -> Result<Vec<PathBuf>> {
        let dir = self.root.join(RECORDS_DIR);
        if !dir.is_dir() {
            warn!("No {} directory under {}", RECORDS_DIR, self.root.display());
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&dir).sort_by_file_name() {
            let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
            let is_json = entry.path().extension().and_then(|ext| ext.to_str()) == Some("json");
            if entry.file_type().is_file() && is_json {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    fn reference_set<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let path = self.root.join(name);
        if !path.is_file() {
            warn!("Reference file {} missing, continuing without it", path.display());
            return Ok(Vec::new());
        }

        let rows = self.cache.rows(&path)?;
        rows.iter()
            .enumerate()
            .map(|(index, row)| {
                T::deserialize(row)
                    .with_context(|| format!("invalid entry #{index} in {}", path.display()))
            })
            .collect()
    }
}
