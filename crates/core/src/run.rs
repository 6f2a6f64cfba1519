//! Composition of the planning pipeline over one immutable snapshot.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    config::AppConfig,
    conflict::{ConflictDetector, ConflictReport, Severity},
    fleet::Fleet,
    ingest::{ExpansionPolicy, IngestWarning, LegNormalizer, PlanningInput, RawRecord},
    models::VoyageLeg,
    stowage::{HandoverStatus, MatchPolicy, OlyaSchedule, TransshipmentMatcher},
    voyage::VoyageBook,
};

/// Leg input of a run.
#[derive(Debug, Clone)]
pub enum LegFeed {
    /// Raw operation records still to be normalized.
    Records(Vec<RawRecord>),
    /// Canonical legs supplied directly, e.g. by a planning layer.
    ///
    /// Legs that end before they start, carry a negative quantity or repeat an
    /// earlier id are skipped with a warning.
    Legs(Vec<VoyageLeg>),
}

/// Knobs of a planning run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    /// Transfer nodes to build stowage schedules for.
    pub transfer_nodes: Vec<String>,
    /// Matcher policy.
    pub matching: MatchPolicy,
    /// Summary record expansion policy.
    pub expansion: ExpansionPolicy,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for RunSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            transfer_nodes: config.transfer_nodes.clone(),
            matching: MatchPolicy::from(&config.matching),
            expansion: ExpansionPolicy::from(&config.expansion),
        }
    }
}

/// Immutable reference data and canonical legs a run is computed from.
#[derive(Debug, Clone, Default)]
pub struct PlanningSnapshot {
    fleet: Fleet,
    legs: Vec<VoyageLeg>,
    warnings: Vec<IngestWarning>,
}

impl PlanningSnapshot {
    /// Build a snapshot, normalizing raw records with `expansion`.
    pub fn new(fleet: Fleet, feed: LegFeed, expansion: ExpansionPolicy) -> Self {
        let (legs, warnings) = match feed {
            LegFeed::Records(records) => {
                let normalized = LegNormalizer::new(expansion).normalize(&records);
                (normalized.legs, normalized.warnings)
            }
            LegFeed::Legs(legs) => validate(legs),
        };
        Self {
            fleet,
            legs,
            warnings,
        }
    }

    /// Snapshot of everything a data loader produced.
    pub fn from_input(input: PlanningInput, expansion: ExpansionPolicy) -> Self {
        Self::new(
            Fleet::new(input.ports, input.vessels),
            LegFeed::Records(input.records),
            expansion,
        )
    }

    /// Reference data.
    pub fn fleet(&self) -> &Fleet {
        &self.fleet
    }

    /// Canonical legs.
    pub fn legs(&self) -> &[VoyageLeg] {
        &self.legs
    }

    /// Defects of the records that were skipped.
    pub fn warnings(&self) -> &[IngestWarning] {
        &self.warnings
    }

    /// Copy restricted to the legs of `voyage_ids`.
    pub fn restricted_to(&self, voyage_ids: &BTreeSet<String>) -> Self {
        Self {
            fleet: self.fleet.clone(),
            legs: self
                .legs
                .iter()
                .filter(|leg| voyage_ids.contains(&leg.voyage_id))
                .cloned()
                .collect(),
            warnings: self.warnings.clone(),
        }
    }
}

fn validate(legs: Vec<VoyageLeg>) -> (Vec<VoyageLeg>, Vec<IngestWarning>) {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(legs.len());
    let mut warnings = Vec::new();
    for (index, leg) in legs.into_iter().enumerate() {
        match check_leg(index, &leg, &mut seen) {
            Ok(()) => kept.push(leg),
            Err(defect) => {
                warn!("Skipping {defect}");
                warnings.push(defect);
            }
        }
    }
    (kept, warnings)
}

fn check_leg(index: usize, leg: &VoyageLeg, seen: &mut HashSet<String>) -> Result<(), IngestWarning> {
    let record = format!("feed#{index} (leg {})", leg.id);
    if leg.end() < leg.start() {
        return Err(IngestWarning::InvertedInterval { record });
    }
    if leg.quantity.is_nan() || leg.quantity < 0.0 {
        return Err(IngestWarning::InvalidField {
            record,
            field: "qty_mt",
            value: leg.quantity.to_string(),
        });
    }
    if !seen.insert(leg.id.clone()) {
        return Err(IngestWarning::DuplicateLeg {
            record,
            leg_id: leg.id.clone(),
        });
    }
    Ok(())
}

/// Derived views of one run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Voyages keyed by id.
    pub voyages: VoyageBook,
    /// One schedule per transfer node, in configured order.
    pub schedules: Vec<OlyaSchedule>,
    /// Severity-ranked conflicts.
    pub conflicts: ConflictReport,
    /// Skipped input records.
    pub warnings: Vec<IngestWarning>,
}

impl RunOutcome {
    /// Schedule of `node`.
    pub fn schedule(&self, node: &str) -> Option<&OlyaSchedule> {
        self.schedules.iter().find(|schedule| schedule.node == node)
    }
}

/// A voyage subset chosen by an external planning layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    /// Display name, e.g. `max revenue`.
    pub name: String,
    /// Voyages the strategy keeps.
    pub voyage_ids: BTreeSet<String>,
}

/// Headline figures of one strategy evaluated against the same snapshot.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyComparison {
    pub name: String,
    pub voyages: usize,
    pub legs: usize,
    pub matches_ok: usize,
    pub matches_warning: usize,
    pub matches_critical: usize,
    pub matches_overlap: usize,
    pub critical_conflicts: usize,
    pub minor_conflicts: usize,
}

/// Runs the aggregator, matcher and conflict detector over a snapshot.
#[derive(Debug, Clone, Default)]
pub struct PlanningRun {
    settings: RunSettings,
}

impl PlanningRun {
    /// Run with `settings`.
    pub fn new(settings: RunSettings) -> Self {
        Self { settings }
    }

    /// Settings in effect.
    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Recompute every derived view from the snapshot.
    pub fn execute(&self, snapshot: &PlanningSnapshot) -> RunOutcome {
        let legs = snapshot.legs();
        let fleet = snapshot.fleet();
        let matcher = TransshipmentMatcher::new(self.settings.matching);

        let (voyages, (schedules, conflicts)) = rayon::join(
            || VoyageBook::aggregate(legs, fleet),
            || {
                let schedules = matcher.match_nodes(legs, fleet, &self.settings.transfer_nodes);
                let conflicts = ConflictDetector.detect(legs, &schedules);
                (schedules, conflicts)
            },
        );

        info!(
            legs = legs.len(),
            voyages = voyages.len(),
            matches = schedules.iter().map(|s| s.matches.len()).sum::<usize>(),
            critical = conflicts.count(Severity::Critical),
            minor = conflicts.count(Severity::Minor),
            skipped = snapshot.warnings().len(),
            "Planning run complete"
        );

        RunOutcome {
            voyages,
            schedules,
            conflicts,
            warnings: snapshot.warnings().to_vec(),
        }
    }

    /// Evaluate each strategy's voyage subset against the same snapshot.
    pub fn compare_strategies(
        &self,
        snapshot: &PlanningSnapshot,
        strategies: &[Strategy],
    ) -> Vec<StrategyComparison> {
        strategies
            .iter()
            .map(|strategy| {
                let subset = snapshot.restricted_to(&strategy.voyage_ids);
                let outcome = self.execute(&subset);
                let matches = |status| -> usize {
                    outcome
                        .schedules
                        .iter()
                        .map(|schedule| schedule.count(status))
                        .sum()
                };
                StrategyComparison {
                    name: strategy.name.clone(),
                    voyages: outcome.voyages.len(),
                    legs: subset.legs().len(),
                    matches_ok: matches(HandoverStatus::Ok),
                    matches_warning: matches(HandoverStatus::Warning),
                    matches_critical: matches(HandoverStatus::Critical),
                    matches_overlap: matches(HandoverStatus::Overlap),
                    critical_conflicts: outcome.conflicts.count(Severity::Critical),
                    minor_conflicts: outcome.conflicts.count(Severity::Minor),
                }
            })
            .collect()
    }
}
