//! Fleet-wide resource contention and handover checks.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    models::VoyageLeg,
    stowage::{HandoverStatus, OlyaSchedule, StowageMatch},
    time::hours_between,
};

/// Category of a detected conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConflictKind {
    /// A vessel is booked for two legs at once.
    VesselOverlap,
    /// A berth is assigned to two legs at once.
    BerthOverlap,
    /// A barge-to-vessel handover overlaps or leaves no margin.
    HandoverViolation,
    /// A discharge or loading at a transfer node has no counterpart.
    UnmatchedCargo,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::VesselOverlap => "Vessel overlap",
            Self::BerthOverlap => "Berth overlap",
            Self::HandoverViolation => "Handover violation",
            Self::UnmatchedCargo => "Unmatched cargo",
        })
    }
}

/// Ordering puts `Critical` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    /// Physically impossible plan.
    Critical,
    /// Needs attention but can be executed.
    Minor,
}

/// One detected conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// Category.
    pub kind: ConflictKind,
    /// Severity.
    pub severity: Severity,
    /// Vessel id, berth id or transfer node the conflict concerns.
    pub resource: String,
    /// Ids of the offending legs.
    pub legs: Vec<String>,
    /// Handover the conflict was raised for, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stowage: Option<StowageMatch>,
    /// Earliest timestamp of the underlying legs.
    pub earliest: DateTime<Utc>,
    /// Human-readable description.
    pub description: String,
}

impl ConflictRecord {
    /// Whether the conflict references `leg_id`.
    pub fn involves(&self, leg_id: &str) -> bool {
        self.legs.iter().any(|id| id == leg_id)
    }
}

/// Conflicts ordered by severity, then by earliest timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConflictReport {
    records: Vec<ConflictRecord>,
}

impl ConflictReport {
    /// Order the records: `Critical` before `Minor`, earlier before later, otherwise stable.
    pub fn new(mut records: Vec<ConflictRecord>) -> Self {
        records.sort_by(|a, b| {
            a.severity
                .cmp(&b.severity)
                .then_with(|| a.earliest.cmp(&b.earliest))
        });
        Self { records }
    }

    /// All records in report order.
    pub fn records(&self) -> &[ConflictRecord] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the plan is conflict-free.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records with `severity`.
    pub fn count(&self, severity: Severity) -> usize {
        self.records
            .iter()
            .filter(|record| record.severity == severity)
            .count()
    }

    /// Records of one kind, in report order.
    pub fn of_kind(&self, kind: ConflictKind) -> Vec<&ConflictRecord> {
        self.records.iter().filter(|record| record.kind == kind).collect()
    }

    /// Records that reference `leg_id`.
    pub fn involving(&self, leg_id: &str) -> Vec<&ConflictRecord> {
        self.records
            .iter()
            .filter(|record| record.involves(leg_id))
            .collect()
    }
}

/// Scans a leg snapshot and its transfer-node schedules for conflicts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictDetector;

impl ConflictDetector {
    /// Run every check. Resource scans and schedule checks run in parallel.
    pub fn detect(&self, legs: &[VoyageLeg], schedules: &[OlyaSchedule]) -> ConflictReport {
        let ((vessels, berths), handovers) = rayon::join(
            || rayon::join(|| vessel_overlaps(legs), || berth_overlaps(legs)),
            || schedule_conflicts(schedules),
        );

        let mut records = vessels;
        records.extend(berths);
        records.extend(handovers);
        ConflictReport::new(records)
    }
}

fn vessel_overlaps(legs: &[VoyageLeg]) -> Vec<ConflictRecord> {
    let groups = group_by(legs, |leg| Some(leg.vessel_id.as_str()));
    groups
        .into_par_iter()
        .flat_map_iter(|(vessel, legs)| overlapping_pairs(legs).into_iter().map(move |(a, b)| {
            ConflictRecord {
                kind: ConflictKind::VesselOverlap,
                severity: Severity::Critical,
                resource: vessel.to_string(),
                legs: vec![a.id.clone(), b.id.clone()],
                stowage: None,
                earliest: a.start().min(b.start()),
                description: format!(
                    "Vessel {vessel}: {} overlaps {} by {:.1} h",
                    describe_leg(a),
                    describe_leg(b),
                    overlap_hours(a, b)
                ),
            }
        }))
        .collect()
}

fn berth_overlaps(legs: &[VoyageLeg]) -> Vec<ConflictRecord> {
    let groups = group_by(legs, |leg| leg.berth_id.as_deref());
    groups
        .into_par_iter()
        .flat_map_iter(|(berth, legs)| overlapping_pairs(legs).into_iter().map(move |(a, b)| {
            ConflictRecord {
                kind: ConflictKind::BerthOverlap,
                severity: Severity::Critical,
                resource: berth.to_string(),
                legs: vec![a.id.clone(), b.id.clone()],
                stowage: None,
                earliest: a.start().min(b.start()),
                description: format!(
                    "Berth {berth}: {} of {} overlaps {} of {} by {:.1} h",
                    describe_leg(a),
                    a.vessel_id,
                    describe_leg(b),
                    b.vessel_id,
                    overlap_hours(a, b)
                ),
            }
        }))
        .collect()
}

fn schedule_conflicts(schedules: &[OlyaSchedule]) -> Vec<ConflictRecord> {
    let mut records = Vec::new();
    for schedule in schedules {
        for stowage in &schedule.matches {
            let severity = match stowage.status {
                HandoverStatus::Overlap => Severity::Critical,
                HandoverStatus::Critical => Severity::Minor,
                HandoverStatus::Warning | HandoverStatus::Ok => continue,
            };
            records.push(ConflictRecord {
                kind: ConflictKind::HandoverViolation,
                severity,
                resource: schedule.node.clone(),
                legs: vec![stowage.barge_op.id.clone(), stowage.vessel_op.id.clone()],
                stowage: Some(stowage.clone()),
                earliest: stowage.earliest(),
                description: format!(
                    "Handover at {} from {} ({}) to {} ({}) is {}: {}",
                    schedule.node,
                    stowage.barge_op.vessel_id,
                    stowage.barge_op.id,
                    stowage.vessel_op.vessel_id,
                    stowage.vessel_op.id,
                    stowage.status,
                    stowage.notes
                ),
            });
        }

        let unmatched = schedule
            .unmatched_barge_ops
            .iter()
            .map(|leg| (leg, "vessel loading"))
            .chain(
                schedule
                    .unmatched_vessel_ops
                    .iter()
                    .map(|leg| (leg, "barge discharge")),
            );
        for (leg, missing) in unmatched {
            records.push(ConflictRecord {
                kind: ConflictKind::UnmatchedCargo,
                severity: Severity::Minor,
                resource: schedule.node.clone(),
                legs: vec![leg.id.clone()],
                stowage: None,
                earliest: leg.start(),
                description: format!(
                    "{} of {} at {} has no matching {missing}",
                    describe_leg(leg),
                    leg.vessel_id,
                    schedule.node
                ),
            });
        }
    }
    records
}

fn group_by<'a>(
    legs: &'a [VoyageLeg],
    key: impl Fn(&'a VoyageLeg) -> Option<&'a str>,
) -> Vec<(&'a str, Vec<&'a VoyageLeg>)> {
    let mut groups: BTreeMap<&str, Vec<&VoyageLeg>> = BTreeMap::new();
    for leg in legs {
        if let Some(key) = key(leg) {
            groups.entry(key).or_default().push(leg);
        }
    }
    groups.into_iter().collect()
}

/// Every intersecting pair within one resource's legs, earlier-starting leg first.
fn overlapping_pairs(mut legs: Vec<&VoyageLeg>) -> Vec<(&VoyageLeg, &VoyageLeg)> {
    legs.sort_by(|a, b| (a.start(), a.end(), &a.id).cmp(&(b.start(), b.end(), &b.id)));

    let mut pairs = Vec::new();
    for (i, a) in legs.iter().enumerate() {
        if a.window.is_instant() {
            continue;
        }
        for b in &legs[i + 1..] {
            if b.start() >= a.end() {
                break;
            }
            if a.window.intersects(&b.window) {
                pairs.push((*a, *b));
            }
        }
    }
    pairs
}

fn overlap_hours(a: &VoyageLeg, b: &VoyageLeg) -> f64 {
    hours_between(a.start().max(b.start()), a.end().min(b.end()))
}

fn describe_leg(leg: &VoyageLeg) -> String {
    format!(
        "{} leg {} [{} - {})",
        leg.op_group,
        leg.id,
        leg.start().format("%Y-%m-%d %H:%M"),
        leg.end().format("%Y-%m-%d %H:%M")
    )
}
