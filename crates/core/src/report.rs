//! Run report persistence.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    conflict::{ConflictRecord, Severity},
    run::RunOutcome,
    stowage::{HandoverStatus, OlyaSchedule},
    voyage::VoyageSummary,
};

/// File name prefix shared by every persisted report.
pub const REPORT_PREFIX: &str = "olya";

/// Headline figures of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportCounts {
    /// Voyages aggregated.
    pub voyages: usize,
    /// Stowage matches across all nodes.
    pub matches: usize,
    /// Matches whose handover overlaps the discharge.
    pub overlaps: usize,
    /// Critical conflicts.
    pub critical_conflicts: usize,
    /// Minor conflicts.
    pub minor_conflicts: usize,
    /// Input records skipped.
    pub skipped_records: usize,
}

/// Serialized representation of one planning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// When the run finished.
    pub generated_at: DateTime<Utc>,
    /// Transfer nodes the run matched.
    pub nodes: Vec<String>,
    /// Headline figures.
    pub counts: ReportCounts,
    /// Aggregated voyages.
    #[serde(default)]
    pub voyages: Vec<VoyageSummary>,
    /// Transfer node schedules.
    #[serde(default)]
    pub schedules: Vec<OlyaSchedule>,
    /// Severity-ranked conflicts.
    #[serde(default)]
    pub conflicts: Vec<ConflictRecord>,
    /// Human readable ingest warnings.
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl RunReport {
    /// Snapshot the derived views of a run.
    pub fn from_outcome(outcome: &RunOutcome, generated_at: DateTime<Utc>) -> Self {
        let counts = ReportCounts {
            voyages: outcome.voyages.len(),
            matches: outcome.schedules.iter().map(|s| s.matches.len()).sum(),
            overlaps: outcome
                .schedules
                .iter()
                .map(|s| s.count(HandoverStatus::Overlap))
                .sum(),
            critical_conflicts: outcome.conflicts.count(Severity::Critical),
            minor_conflicts: outcome.conflicts.count(Severity::Minor),
            skipped_records: outcome.warnings.len(),
        };
        Self {
            generated_at,
            nodes: outcome.schedules.iter().map(|s| s.node.clone()).collect(),
            counts,
            voyages: outcome.voyages.summaries(),
            schedules: outcome.schedules.clone(),
            conflicts: outcome.conflicts.records().to_vec(),
            warnings: outcome.warnings.iter().map(ToString::to_string).collect(),
        }
    }

    /// Load a report, returning `None` if the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read report {}", path.display()))?;
        let report = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse report {}", path.display()))?;
        Ok(Some(report))
    }

    /// Persist the report, creating parent directories if needed.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create report directory {}", parent.display())
            })?;
        }

        let serialized = serde_json::to_vec_pretty(self).context("failed to serialize run report")?;
        fs::write(path, serialized)
            .with_context(|| format!("failed to write report {}", path.display()))
    }
}

/// Reports written to one output directory.
pub struct ReportStore {
    root: PathBuf,
}

impl ReportStore {
    /// Store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Output directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `report` under its canonical name and return the path.
    pub fn save(&self, report: &RunReport) -> Result<PathBuf> {
        let path = report_path(&self.root, &report.nodes, report.generated_at);
        report.persist(&path)?;
        Ok(path)
    }

    /// Paths of stored reports, most recent first. Unreadable files are skipped.
    pub fn entries(&self) -> Result<Vec<(PathBuf, DateTime<Utc>)>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.root)
            .with_context(|| format!("failed to read {}", self.root.display()))?
        {
            let path = entry?.path();
            let is_report = path.extension().and_then(|ext| ext.to_str()) == Some("json")
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(REPORT_PREFIX));
            if !is_report {
                continue;
            }
            match RunReport::load(&path) {
                Ok(Some(report)) => entries.push((path, report.generated_at)),
                Ok(None) => {}
                Err(err) => warn!("Failed to read report {:?}: {err:#}", path),
            }
        }

        entries.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(entries)
    }

    /// Most recent report, if any.
    pub fn latest(&self) -> Result<Option<RunReport>> {
        match self.entries()?.into_iter().next() {
            Some((path, _)) => RunReport::load(path),
            None => Ok(None),
        }
    }
}

/// `<output_dir>/olya_<nodes>_<timestamp>.json`.
pub fn report_path(
    output_dir: impl AsRef<Path>,
    nodes: &[String],
    generated_at: DateTime<Utc>,
) -> PathBuf {
    let nodes = nodes
        .iter()
        .map(|node| sanitize_component(node))
        .collect::<Vec<_>>()
        .join("-");
    let nodes = if nodes.is_empty() { "none".to_string() } else { nodes };
    output_dir.as_ref().join(format!(
        "{REPORT_PREFIX}_{nodes}_{}.json",
        generated_at.format("%Y%m%dT%H%M%S")
    ))
}

fn sanitize_component(input: &str) -> String {
    let result: String = input
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_'))
        .collect();
    if result.is_empty() {
        "node".to_string()
    } else {
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fleet::Fleet,
        ingest::{ExpansionPolicy, RawRecord},
        run::{LegFeed, PlanningRun, PlanningSnapshot},
    };
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::tempdir;

    fn outcome() -> RunOutcome {
        let records = vec![
            json!({
                "voyage_id": "V1", "leg_seq": 1, "vessel_id": "SHIP-1",
                "op_group": "loading", "port_start": "OYA",
                "start_time": "2024-03-01T00:00:00Z", "end_time": "2024-03-03T00:00:00Z"
            }),
            json!({
                "voyage_id": "V1", "leg_seq": 2, "vessel_id": "SHIP-1",
                "op_group": "laden", "port_start": "OYA", "port_end": "BAKU",
                "start_time": "2024-03-02T00:00:00Z", "end_time": "2024-03-05T00:00:00Z"
            }),
            json!({"voyage_id": "V2"}),
        ]
        .into_iter()
        .enumerate()
        .map(|(index, value)| RawRecord::from_value("legs.json", index, value))
        .collect();
        let snapshot = PlanningSnapshot::new(
            Fleet::default(),
            LegFeed::Records(records),
            ExpansionPolicy::default(),
        );
        PlanningRun::default().execute(&snapshot)
    }

    #[test]
    fn report_captures_counts() {
        let generated_at = Utc.with_ymd_and_hms(2024, 3, 6, 8, 30, 0).unwrap();
        let report = RunReport::from_outcome(&outcome(), generated_at);

        assert_eq!(report.nodes, vec!["OYA"]);
        assert_eq!(report.counts.voyages, 1);
        assert_eq!(report.counts.critical_conflicts, 1);
        // the loading at OYA has no barge discharge
        assert_eq!(report.counts.minor_conflicts, 1);
        assert_eq!(report.counts.skipped_records, 1);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].starts_with("legs.json#2"));
    }

    #[test]
    fn store_lists_most_recent_first() -> Result<()> {
        let dir = tempdir()?;
        let store = ReportStore::new(dir.path().join("reports"));
        assert!(store.entries()?.is_empty());
        assert!(store.latest()?.is_none());

        let outcome = outcome();
        let older = RunReport::from_outcome(&outcome, Utc.with_ymd_and_hms(2024, 3, 6, 8, 0, 0).unwrap());
        let newer = RunReport::from_outcome(&outcome, Utc.with_ymd_and_hms(2024, 3, 7, 8, 0, 0).unwrap());
        let older_path = store.save(&older)?;
        store.save(&newer)?;
        fs::write(store.root().join("olya_broken.json"), "{")?;
        fs::write(store.root().join("notes.txt"), "ignored")?;

        let entries = store.entries()?;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].0, older_path);
        assert_eq!(store.latest()?, Some(newer));
        Ok(())
    }

    #[test]
    fn report_names_are_filesystem_safe() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let path = report_path("out", &["OYA".to_string(), "Aktau port/2".to_string()], at);
        assert_eq!(path, Path::new("out").join("olya_OYA-Aktauport2_20240102T030405.json"));
        assert_eq!(
            report_path("out", &[], at),
            Path::new("out").join("olya_none_20240102T030405.json")
        );
    }
}
