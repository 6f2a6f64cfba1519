//! Barge-to-vessel stowage matching at transfer nodes.
//!
//! Barge discharges at a node are paired one-to-one with sea-vessel loadings, first by
//! shared cargo lot and then greedily by time proximity. Each pair carries the handover
//! gap and its classification.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    fleet::Fleet,
    models::{OperationGroup, VoyageLeg},
    time::{days, hours_between},
};

/// Handover gaps below this many hours leave no safety margin.
pub const CRITICAL_MARGIN_HOURS: f64 = 24.0;
/// Handover gaps below this many hours are tight but workable.
pub const WARNING_MARGIN_HOURS: f64 = 72.0;

/// Classification of a handover gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandoverStatus {
    /// Vessel loading starts before the barge has finished discharging.
    Overlap,
    /// Less than a day between discharge end and loading start.
    Critical,
    /// Less than three days between discharge end and loading start.
    Warning,
    /// Comfortable margin.
    Ok,
}

impl HandoverStatus {
    /// Classify a signed gap in hours.
    pub fn classify(gap_hours: f64) -> Self {
        if gap_hours < 0.0 {
            Self::Overlap
        } else if gap_hours < CRITICAL_MARGIN_HOURS {
            Self::Critical
        } else if gap_hours < WARNING_MARGIN_HOURS {
            Self::Warning
        } else {
            Self::Ok
        }
    }
}

impl fmt::Display for HandoverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Overlap => "OVERLAP",
            Self::Critical => "CRITICAL",
            Self::Warning => "WARNING",
            Self::Ok => "OK",
        })
    }
}

/// How a pair was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchBasis {
    /// Both operations name the same cargo lot.
    CargoLot,
    /// Paired by time proximity within the look-ahead window.
    NearestNeighbour,
}

/// A barge discharge paired with the sea-vessel loading believed to take its cargo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StowageMatch {
    /// Transfer node both operations touch.
    pub node: String,
    /// Discharge leg of the river-sea vessel.
    pub barge_op: VoyageLeg,
    /// Loading leg of the sea vessel.
    pub vessel_op: VoyageLeg,
    /// Hours from barge discharge end to vessel loading start; negative on overlap.
    pub gap_hours: f64,
    /// Classification of the gap.
    pub status: HandoverStatus,
    /// How the pair was established.
    pub basis: MatchBasis,
    /// Human-readable remarks.
    pub notes: String,
}

impl StowageMatch {
    fn new(node: &str, barge_op: VoyageLeg, vessel_op: VoyageLeg, basis: MatchBasis) -> Self {
        assert!(
            barge_op.touches_port(node) && vessel_op.touches_port(node),
            "stowage match {} / {} does not take place at {node}",
            barge_op.id,
            vessel_op.id
        );

        let gap_hours = hours_between(barge_op.end(), vessel_op.start());
        let status = HandoverStatus::classify(gap_hours);
        let notes = describe(&barge_op, status, gap_hours, basis);
        Self {
            node: node.to_string(),
            barge_op,
            vessel_op,
            gap_hours,
            status,
            basis,
            notes,
        }
    }

    /// Earliest timestamp involved in the handover.
    pub fn earliest(&self) -> DateTime<Utc> {
        self.barge_op.start().min(self.vessel_op.start())
    }
}

fn describe(barge_op: &VoyageLeg, status: HandoverStatus, gap_hours: f64, basis: MatchBasis) -> String {
    let basis = match (basis, barge_op.cargo_id.as_deref()) {
        (MatchBasis::CargoLot, Some(lot)) => format!("matched on cargo lot {lot}"),
        _ => "matched by time proximity".to_string(),
    };
    let margin = match status {
        HandoverStatus::Overlap => format!(
            "loading starts {:.1} h before discharge ends",
            -gap_hours
        ),
        HandoverStatus::Critical => format!("{gap_hours:.1} h margin, no safety buffer"),
        HandoverStatus::Warning => format!("{gap_hours:.1} h margin, tight"),
        HandoverStatus::Ok => format!("{gap_hours:.1} h margin"),
    };
    format!("{basis}; {margin}")
}

/// Tunables of the matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchPolicy {
    /// How long after a discharge ends a loading may start and still be paired by time.
    pub lookahead: Duration,
    /// Restrict time-based pairing to operations that carry no cargo lot.
    pub strict_cargo_lots: bool,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            lookahead: days(14),
            strict_cargo_lots: false,
        }
    }
}

/// Matching result for one transfer node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OlyaSchedule {
    /// Transfer node.
    pub node: String,
    /// Pairs ordered by discharge end.
    pub matches: Vec<StowageMatch>,
    /// Every river-sea discharge at the node, ordered by end.
    pub barge_ops: Vec<VoyageLeg>,
    /// Every sea-vessel loading at the node, ordered by start.
    pub vessel_ops: Vec<VoyageLeg>,
    /// Discharges left without a loading.
    pub unmatched_barge_ops: Vec<VoyageLeg>,
    /// Loadings left without a discharge.
    pub unmatched_vessel_ops: Vec<VoyageLeg>,
}

impl OlyaSchedule {
    /// Number of matches with the given status.
    pub fn count(&self, status: HandoverStatus) -> usize {
        self.matches
            .iter()
            .filter(|stowage| stowage.status == status)
            .count()
    }
}

/// Pairs barge discharges with sea-vessel loadings at transfer nodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransshipmentMatcher {
    policy: MatchPolicy,
}

impl TransshipmentMatcher {
    /// Matcher using `policy`.
    pub fn new(policy: MatchPolicy) -> Self {
        Self { policy }
    }

    /// Match every node in parallel.
    ///
    /// A leg touching several of `nodes` is considered only at its home node: its start
    /// port when that is one of `nodes`, else its end port. No leg is paired twice.
    pub fn match_nodes(&self, legs: &[VoyageLeg], fleet: &Fleet, nodes: &[String]) -> Vec<OlyaSchedule> {
        nodes
            .par_iter()
            .map(|node| {
                let claimed = legs
                    .iter()
                    .filter(|leg| home_node(leg, nodes) == Some(node.as_str()));
                self.match_candidates(claimed, fleet, node)
            })
            .collect()
    }

    /// Partition the legs touching `node` and pair them one-to-one.
    pub fn match_node(&self, legs: &[VoyageLeg], fleet: &Fleet, node: &str) -> OlyaSchedule {
        self.match_candidates(legs.iter().filter(|leg| leg.touches_port(node)), fleet, node)
    }

    fn match_candidates<'a>(
        &self,
        candidates: impl Iterator<Item = &'a VoyageLeg>,
        fleet: &Fleet,
        node: &str,
    ) -> OlyaSchedule {
        let (mut barge_ops, mut vessel_ops): (Vec<VoyageLeg>, Vec<VoyageLeg>) = (Vec::new(), Vec::new());
        for leg in candidates {
            let river_sea = fleet.is_river_sea(&leg.vessel_id);
            match leg.op_group {
                OperationGroup::Discharge if river_sea => barge_ops.push(leg.clone()),
                OperationGroup::Loading if !river_sea => vessel_ops.push(leg.clone()),
                _ => {}
            }
        }
        barge_ops.sort_by(|a, b| {
            (a.end(), a.start(), &a.id).cmp(&(b.end(), b.start(), &b.id))
        });
        vessel_ops.sort_by(|a, b| (a.start(), &a.id).cmp(&(b.start(), &b.id)));

        let mut barge_taken = vec![false; barge_ops.len()];
        let mut vessel_taken = vec![false; vessel_ops.len()];
        let mut pairs = Vec::new();

        // cargo lot continuity first; the earliest-ending discharge of the lot wins
        for (vi, vessel_op) in vessel_ops.iter().enumerate() {
            let Some(lot) = vessel_op.cargo_id.as_deref() else {
                continue;
            };
            let barge = barge_ops
                .iter()
                .enumerate()
                .position(|(bi, barge_op)| !barge_taken[bi] && barge_op.cargo_id.as_deref() == Some(lot));
            if let Some(bi) = barge {
                barge_taken[bi] = true;
                vessel_taken[vi] = true;
                pairs.push((bi, vi, MatchBasis::CargoLot));
            }
        }

        // greedy time proximity for whatever is left, discharges in end order
        for (bi, barge_op) in barge_ops.iter().enumerate() {
            if barge_taken[bi] || (self.policy.strict_cargo_lots && barge_op.cargo_id.is_some()) {
                continue;
            }
            let horizon = barge_op.end() + self.policy.lookahead;
            let vessel = vessel_ops.iter().enumerate().position(|(vi, vessel_op)| {
                !vessel_taken[vi]
                    && !(self.policy.strict_cargo_lots && vessel_op.cargo_id.is_some())
                    && vessel_op.start() >= barge_op.start()
                    && vessel_op.start() <= horizon
            });
            if let Some(vi) = vessel {
                barge_taken[bi] = true;
                vessel_taken[vi] = true;
                pairs.push((bi, vi, MatchBasis::NearestNeighbour));
            }
        }

        let mut matches: Vec<StowageMatch> = pairs
            .into_iter()
            .map(|(bi, vi, basis)| {
                StowageMatch::new(node, barge_ops[bi].clone(), vessel_ops[vi].clone(), basis)
            })
            .collect();
        matches.sort_by(|a, b| {
            (a.barge_op.end(), a.vessel_op.start()).cmp(&(b.barge_op.end(), b.vessel_op.start()))
        });

        let unmatched_barge_ops = untaken(&barge_ops, &barge_taken);
        let unmatched_vessel_ops = untaken(&vessel_ops, &vessel_taken);

        debug!(
            node,
            barge_ops = barge_ops.len(),
            vessel_ops = vessel_ops.len(),
            matches = matches.len(),
            unmatched_barge = unmatched_barge_ops.len(),
            unmatched_vessel = unmatched_vessel_ops.len(),
            "Transfer node matched"
        );

        OlyaSchedule {
            node: node.to_string(),
            matches,
            barge_ops,
            vessel_ops,
            unmatched_barge_ops,
            unmatched_vessel_ops,
        }
    }
}

fn home_node<'a>(leg: &VoyageLeg, nodes: &'a [String]) -> Option<&'a str> {
    [&leg.port_start, &leg.port_end]
        .into_iter()
        .find_map(|port| nodes.iter().find(|node| *node == port))
        .map(String::as_str)
}

fn untaken(ops: &[VoyageLeg], taken: &[bool]) -> Vec<VoyageLeg> {
    ops.iter()
        .zip(taken)
        .filter(|(_, taken)| !**taken)
        .map(|(op, _)| op.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LegStatus, TimeWindow, Vessel, VesselType};
    use chrono::TimeZone;
    use std::collections::HashSet;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
    }

    fn fleet() -> Fleet {
        let barge = |id: &str| {
            let mut vessel = Vessel::placeholder(id);
            vessel.placeholder = false;
            vessel.vessel_type = VesselType::Barge;
            vessel.class = "river-sea".to_string();
            vessel
        };
        let ship = |id: &str| {
            let mut vessel = Vessel::placeholder(id);
            vessel.placeholder = false;
            vessel.class = "Handysize".to_string();
            vessel
        };
        Fleet::new(
            Vec::new(),
            vec![barge("B1"), barge("B2"), barge("B3"), ship("S1"), ship("S2"), ship("S3")],
        )
    }

    fn op(
        id: &str,
        vessel: &str,
        group: OperationGroup,
        lot: Option<&str>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> VoyageLeg {
        VoyageLeg {
            id: id.to_string(),
            voyage_id: format!("voy-{id}"),
            seq: 1,
            vessel_id: vessel.to_string(),
            op_group: group,
            op_detail: String::new(),
            leg_type: group.default_leg_type(),
            port_start: "OYA".to_string(),
            port_end: "OYA".to_string(),
            berth_id: None,
            cargo_id: lot.map(str::to_string),
            quantity: 5000.0,
            window: TimeWindow::new(start, end),
            status: LegStatus::Planned,
            remarks: String::new(),
        }
    }

    fn discharge(id: &str, vessel: &str, lot: Option<&str>, end: DateTime<Utc>) -> VoyageLeg {
        op(id, vessel, OperationGroup::Discharge, lot, end - Duration::hours(36), end)
    }

    fn loading(id: &str, vessel: &str, lot: Option<&str>, start: DateTime<Utc>) -> VoyageLeg {
        op(id, vessel, OperationGroup::Loading, lot, start, start + Duration::hours(48))
    }

    #[test]
    fn classification_boundaries_are_exact() {
        let cases = [
            (-1.0, HandoverStatus::Overlap),
            (0.0, HandoverStatus::Critical),
            (23.999, HandoverStatus::Critical),
            (24.0, HandoverStatus::Warning),
            (71.999, HandoverStatus::Warning),
            (72.0, HandoverStatus::Ok),
        ];
        for (gap, expected) in cases {
            assert_eq!(HandoverStatus::classify(gap), expected, "gap {gap}");
        }
    }

    #[test]
    fn millisecond_gaps_classify_on_the_right_side() {
        let end = base();
        let legs = vec![
            discharge("D1", "B1", Some("L1"), end),
            loading("V1", "S1", Some("L1"), end + Duration::milliseconds(86_396_400)),
        ];
        let schedule = TransshipmentMatcher::default().match_node(&legs, &fleet(), "OYA");
        assert_eq!(schedule.matches[0].gap_hours, 23.999);
        assert_eq!(schedule.matches[0].status, HandoverStatus::Critical);
    }

    #[test]
    fn same_lot_thirty_hours_later_is_a_warning() {
        let end = base();
        let legs = vec![
            discharge("D1", "B1", Some("LOT-7"), end),
            loading("V1", "S1", Some("LOT-7"), end + Duration::hours(30)),
        ];
        let schedule = TransshipmentMatcher::default().match_node(&legs, &fleet(), "OYA");

        assert_eq!(schedule.matches.len(), 1);
        let stowage = &schedule.matches[0];
        assert_eq!(stowage.gap_hours, 30.0);
        assert_eq!(stowage.status, HandoverStatus::Warning);
        assert_eq!(stowage.basis, MatchBasis::CargoLot);
        assert!(stowage.notes.contains("LOT-7"));
        assert!(schedule.unmatched_barge_ops.is_empty());
        assert!(schedule.unmatched_vessel_ops.is_empty());
    }

    #[test]
    fn loading_before_discharge_ends_is_an_overlap() {
        let end = base();
        let legs = vec![
            discharge("D1", "B1", Some("LOT-7"), end),
            loading("V1", "S1", Some("LOT-7"), end - Duration::hours(2)),
        ];
        let schedule = TransshipmentMatcher::default().match_node(&legs, &fleet(), "OYA");
        assert_eq!(schedule.matches[0].gap_hours, -2.0);
        assert_eq!(schedule.matches[0].status, HandoverStatus::Overlap);
    }

    #[test]
    fn partitions_by_vessel_class_and_operation() {
        let end = base();
        let mut elsewhere = loading("V9", "S2", None, end);
        elsewhere.port_start = "BAKU".to_string();
        elsewhere.port_end = "BAKU".to_string();
        let legs = vec![
            discharge("D1", "B1", None, end),
            // a barge loading and a ship discharging are neither side of the handover
            op("X1", "B2", OperationGroup::Loading, None, end, end + Duration::hours(5)),
            op("X2", "S3", OperationGroup::Discharge, None, end, end + Duration::hours(5)),
            loading("V1", "S1", None, end + Duration::hours(80)),
            elsewhere,
        ];
        let schedule = TransshipmentMatcher::default().match_node(&legs, &fleet(), "OYA");

        let barge_ids: Vec<_> = schedule.barge_ops.iter().map(|leg| leg.id.as_str()).collect();
        let vessel_ids: Vec<_> = schedule.vessel_ops.iter().map(|leg| leg.id.as_str()).collect();
        assert_eq!(barge_ids, vec!["D1"]);
        assert_eq!(vessel_ids, vec!["V1"]);
        assert_eq!(schedule.matches[0].status, HandoverStatus::Ok);
        assert_eq!(schedule.matches[0].basis, MatchBasis::NearestNeighbour);
    }

    #[test]
    fn fallback_pairs_earliest_first_within_lookahead() {
        let t = base();
        let legs = vec![
            discharge("D1", "B1", None, t),
            discharge("D2", "B2", None, t + Duration::hours(10)),
            discharge("D3", "B3", None, t + Duration::days(40)),
            loading("V2", "S2", None, t + Duration::hours(50)),
            loading("V1", "S1", None, t + Duration::hours(20)),
            loading("V3", "S3", None, t + Duration::days(20)),
        ];
        let schedule = TransshipmentMatcher::default().match_node(&legs, &fleet(), "OYA");

        let pairs: Vec<_> = schedule
            .matches
            .iter()
            .map(|m| (m.barge_op.id.as_str(), m.vessel_op.id.as_str()))
            .collect();
        assert_eq!(pairs, vec![("D1", "V1"), ("D2", "V2")]);

        let unmatched_barges: Vec<_> = schedule
            .unmatched_barge_ops
            .iter()
            .map(|leg| leg.id.as_str())
            .collect();
        let unmatched_vessels: Vec<_> = schedule
            .unmatched_vessel_ops
            .iter()
            .map(|leg| leg.id.as_str())
            .collect();
        // V3 starts before D3 even begins, and 20 days after D2 is beyond the look-ahead
        assert_eq!(unmatched_barges, vec!["D3"]);
        assert_eq!(unmatched_vessels, vec!["V3"]);
    }

    #[test]
    fn lookahead_is_configurable() {
        let t = base();
        let legs = vec![
            discharge("D1", "B1", None, t),
            loading("V1", "S1", None, t + Duration::days(3)),
        ];
        let narrow = TransshipmentMatcher::new(MatchPolicy {
            lookahead: Duration::days(2),
            ..MatchPolicy::default()
        });
        let schedule = narrow.match_node(&legs, &fleet(), "OYA");
        assert!(schedule.matches.is_empty());
        assert_eq!(schedule.unmatched_barge_ops.len(), 1);
        assert_eq!(schedule.unmatched_vessel_ops.len(), 1);
    }

    #[test]
    fn strict_lots_keep_labelled_cargo_out_of_time_pairing() {
        let t = base();
        let legs = vec![
            discharge("D1", "B1", Some("LOT-1"), t),
            loading("V1", "S1", Some("LOT-2"), t + Duration::hours(30)),
        ];
        let lenient = TransshipmentMatcher::default().match_node(&legs, &fleet(), "OYA");
        assert_eq!(lenient.matches.len(), 1);

        let strict = TransshipmentMatcher::new(MatchPolicy {
            strict_cargo_lots: true,
            ..MatchPolicy::default()
        })
        .match_node(&legs, &fleet(), "OYA");
        assert!(strict.matches.is_empty());
    }

    #[test]
    fn matching_is_one_to_one() {
        let t = base();
        let mut legs = Vec::new();
        for i in 0..6 {
            let lot = if i % 2 == 0 { Some("SHARED") } else { None };
            legs.push(discharge(&format!("D{i}"), "B1", lot, t + Duration::hours(6 * i)));
            legs.push(loading(&format!("V{i}"), "S1", lot, t + Duration::hours(6 * i + 3)));
        }
        let schedule = TransshipmentMatcher::default().match_node(&legs, &fleet(), "OYA");

        let barges: HashSet<_> = schedule.matches.iter().map(|m| m.barge_op.id.clone()).collect();
        let vessels: HashSet<_> = schedule.matches.iter().map(|m| m.vessel_op.id.clone()).collect();
        assert_eq!(barges.len(), schedule.matches.len());
        assert_eq!(vessels.len(), schedule.matches.len());
        assert_eq!(
            schedule.matches.len() + schedule.unmatched_barge_ops.len(),
            schedule.barge_ops.len()
        );
        assert_eq!(
            schedule.matches.len() + schedule.unmatched_vessel_ops.len(),
            schedule.vessel_ops.len()
        );
    }

    #[test]
    fn nodes_are_matched_independently() {
        let t = base();
        let mut at_aktau = discharge("D2", "B2", Some("L2"), t);
        at_aktau.port_start = "AKTAU".to_string();
        at_aktau.port_end = "AKTAU".to_string();
        let mut load_aktau = loading("V2", "S2", Some("L2"), t + Duration::hours(80));
        load_aktau.port_start = "AKTAU".to_string();
        load_aktau.port_end = "AKTAU".to_string();
        let legs = vec![
            discharge("D1", "B1", Some("L1"), t),
            loading("V1", "S1", Some("L1"), t + Duration::hours(5)),
            at_aktau,
            load_aktau,
        ];

        let nodes = vec!["OYA".to_string(), "AKTAU".to_string()];
        let schedules = TransshipmentMatcher::default().match_nodes(&legs, &fleet(), &nodes);
        assert_eq!(schedules.len(), 2);
        assert_eq!(schedules[0].node, "OYA");
        assert_eq!(schedules[0].count(HandoverStatus::Critical), 1);
        assert_eq!(schedules[1].node, "AKTAU");
        assert_eq!(schedules[1].count(HandoverStatus::Ok), 1);
    }

    #[test]
    fn leg_spanning_two_nodes_is_paired_once() {
        let t = base();
        // discharge shifting from OYA to AKTAU belongs to OYA
        let mut shifting = discharge("D1", "B1", None, t);
        shifting.port_end = "AKTAU".to_string();
        let mut load_aktau = loading("V2", "S2", None, t + Duration::hours(80));
        load_aktau.port_start = "AKTAU".to_string();
        load_aktau.port_end = "AKTAU".to_string();
        let legs = vec![
            shifting,
            loading("V1", "S1", None, t + Duration::hours(100)),
            load_aktau,
        ];

        let nodes = vec!["AKTAU".to_string(), "OYA".to_string()];
        let schedules = TransshipmentMatcher::default().match_nodes(&legs, &fleet(), &nodes);
        let paired: Vec<&str> = schedules
            .iter()
            .flat_map(|schedule| schedule.matches.iter().map(|m| m.barge_op.id.as_str()))
            .collect();
        assert_eq!(paired, vec!["D1"]);

        let (aktau, oya) = (&schedules[0], &schedules[1]);
        assert!(aktau.barge_ops.is_empty());
        assert_eq!(aktau.unmatched_vessel_ops.len(), 1);
        assert_eq!(oya.matches[0].vessel_op.id, "V1");

        // a single-node query still sees every leg touching it
        let alone = TransshipmentMatcher::default().match_node(&legs, &fleet(), "AKTAU");
        assert_eq!(alone.matches[0].barge_op.id, "D1");
        assert_eq!(alone.matches[0].vessel_op.id, "V2");
    }
}
