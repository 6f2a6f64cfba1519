//! Voyage aggregation and the read-only voyage query surface.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    fleet::Fleet,
    models::{LegStatus, OperationGroup, TimeWindow, VoyageLeg},
};

/// Lifecycle state derived from the statuses of a voyage's legs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoyageStatus {
    /// No leg has started.
    Planned,
    /// At least one leg is in process.
    #[serde(rename = "In Progress")]
    InProgress,
    /// Every leg is completed.
    Completed,
}

/// Legs of one voyage ordered by sequence number, plus derived attributes.
#[derive(Debug, Clone, Serialize)]
pub struct Voyage {
    /// Voyage identifier.
    pub id: String,
    /// Vessel performing the voyage.
    pub vessel_id: String,
    /// Display name of the vessel.
    pub vessel_name: String,
    /// Set when the vessel id was missing from the reference data.
    pub placeholder_vessel: bool,
    legs: Vec<VoyageLeg>,
}

impl Voyage {
    fn from_legs(id: String, fleet: &Fleet, mut legs: Vec<VoyageLeg>) -> Self {
        assert!(!legs.is_empty(), "voyage {id} has no legs");
        legs.sort_by(|a, b| a.seq.cmp(&b.seq).then_with(|| a.id.cmp(&b.id)));

        let vessel = fleet.vessel_or_placeholder(&legs[0].vessel_id);
        Self {
            id,
            vessel_id: vessel.id.clone(),
            vessel_name: vessel.name.clone(),
            placeholder_vessel: vessel.placeholder,
            legs,
        }
    }

    /// Legs in sequence order.
    pub fn legs(&self) -> &[VoyageLeg] {
        &self.legs
    }

    /// Earliest leg start.
    pub fn start(&self) -> DateTime<Utc> {
        self.legs
            .iter()
            .map(VoyageLeg::start)
            .min()
            .unwrap_or_else(|| unreachable!("voyage without legs"))
    }

    /// Latest leg end.
    pub fn end(&self) -> DateTime<Utc> {
        self.legs
            .iter()
            .map(VoyageLeg::end)
            .max()
            .unwrap_or_else(|| unreachable!("voyage without legs"))
    }

    /// Span from first start to last end.
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start(), self.end())
    }

    /// Start port of the first loading leg.
    pub fn load_port(&self) -> Option<&str> {
        self.first_of(OperationGroup::Loading)
            .map(|leg| leg.port_start.as_str())
    }

    /// Start port of the first discharge leg.
    pub fn discharge_port(&self) -> Option<&str> {
        self.first_of(OperationGroup::Discharge)
            .map(|leg| leg.port_start.as_str())
    }

    /// First cargo lot encountered in leg order.
    pub fn cargo_lot(&self) -> Option<&str> {
        self.legs.iter().find_map(|leg| leg.cargo_id.as_deref())
    }

    /// Quantity of the first loading leg carrying cargo.
    pub fn quantity(&self) -> Option<f64> {
        self.legs
            .iter()
            .find(|leg| leg.op_group == OperationGroup::Loading && leg.quantity > 0.0)
            .map(|leg| leg.quantity)
    }

    /// Status derived from the legs.
    pub fn status(&self) -> VoyageStatus {
        if self.legs.iter().all(|leg| leg.status == LegStatus::Completed) {
            VoyageStatus::Completed
        } else if self.legs.iter().any(|leg| leg.status == LegStatus::InProcess) {
            VoyageStatus::InProgress
        } else {
            VoyageStatus::Planned
        }
    }

    /// Flattened view for reporting.
    pub fn summary(&self) -> VoyageSummary {
        VoyageSummary {
            id: self.id.clone(),
            vessel_id: self.vessel_id.clone(),
            vessel_name: self.vessel_name.clone(),
            placeholder_vessel: self.placeholder_vessel,
            start: self.start(),
            end: self.end(),
            load_port: self.load_port().map(str::to_string),
            discharge_port: self.discharge_port().map(str::to_string),
            cargo_lot: self.cargo_lot().map(str::to_string),
            quantity: self.quantity(),
            status: self.status(),
            legs: self.legs.len(),
        }
    }

    fn first_of(&self, group: OperationGroup) -> Option<&VoyageLeg> {
        self.legs.iter().find(|leg| leg.op_group == group)
    }
}

/// Serializable one-line description of a voyage.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoyageSummary {
    pub id: String,
    pub vessel_id: String,
    pub vessel_name: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub placeholder_vessel: bool,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub load_port: Option<String>,
    pub discharge_port: Option<String>,
    pub cargo_lot: Option<String>,
    pub quantity: Option<f64>,
    pub status: VoyageStatus,
    pub legs: usize,
}

/// Voyages of a run keyed by id.
#[derive(Debug, Clone, Default)]
pub struct VoyageBook {
    voyages: BTreeMap<String, Voyage>,
}

impl VoyageBook {
    /// Group legs by voyage and build one voyage per group.
    ///
    /// Vessel ids missing from `fleet` are backed by placeholder vessels.
    pub fn aggregate(legs: &[VoyageLeg], fleet: &Fleet) -> Self {
        let mut groups: BTreeMap<String, Vec<VoyageLeg>> = BTreeMap::new();
        for leg in legs {
            groups
                .entry(leg.voyage_id.clone())
                .or_default()
                .push(leg.clone());
        }

        let voyages = groups
            .into_iter()
            .map(|(id, legs)| (id.clone(), Voyage::from_legs(id, fleet, legs)))
            .collect();
        Self { voyages }
    }

    /// Voyage by id.
    pub fn get(&self, id: &str) -> Option<&Voyage> {
        self.voyages.get(id)
    }

    /// All voyages ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &Voyage> {
        self.voyages.values()
    }

    /// Number of voyages.
    pub fn len(&self) -> usize {
        self.voyages.len()
    }

    /// Whether no voyage was built.
    pub fn is_empty(&self) -> bool {
        self.voyages.is_empty()
    }

    /// Voyages performed by `vessel_id`, earliest first.
    pub fn for_vessel(&self, vessel_id: &str) -> Vec<&Voyage> {
        let mut voyages: Vec<_> = self
            .iter()
            .filter(|voyage| voyage.vessel_id == vessel_id)
            .collect();
        voyages.sort_by_key(|voyage| voyage.start());
        voyages
    }

    /// Legs starting or ending at `port`, earliest first.
    pub fn legs_touching_port(&self, port: &str) -> Vec<&VoyageLeg> {
        let mut legs: Vec<_> = self
            .iter()
            .flat_map(Voyage::legs)
            .filter(|leg| leg.touches_port(port))
            .collect();
        legs.sort_by(|a, b| a.start().cmp(&b.start()).then_with(|| a.id.cmp(&b.id)));
        legs
    }

    /// Voyages whose span overlaps `window`, as needed for calendar views.
    ///
    /// Unlike conflict checks, a voyage touching the window boundary counts as active.
    pub fn active_within(&self, window: TimeWindow) -> Vec<&Voyage> {
        self.iter()
            .filter(|voyage| voyage.start() <= window.end && window.start <= voyage.end())
            .collect()
    }

    /// Voyages whose vessel is unknown to the reference data.
    pub fn placeholder_backed(&self) -> Vec<&Voyage> {
        self.iter().filter(|voyage| voyage.placeholder_vessel).collect()
    }

    /// Summaries of every voyage.
    pub fn summaries(&self) -> Vec<VoyageSummary> {
        self.iter().map(Voyage::summary).collect()
    }
}
