//! Shared domain models.

mod leg;

pub use leg::{LegStatus, LegType, OperationGroup, VoyageLeg};

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Matches class designations of vessels that can navigate both river and sea waters.
static RIVER_SEA_CLASS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(river[\s_-]*sea|\brsd?[\d.,]*\b|\bm-?sp[\d.,]*\b|\bo-?pr[\d.,]*\b)")
        .expect("failed to compile river-sea class regex")
});

/// Port reference data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    /// Short identifier (e.g. `OYA`).
    #[serde(alias = "port_id")]
    pub id: String,
    /// Human-readable port name.
    #[serde(default)]
    pub name: String,
    /// Country the port belongs to.
    #[serde(default)]
    pub country: String,
    /// Sea or river basin the port is located in.
    #[serde(default)]
    pub basin: String,
    /// Whether the port handles liquid cargo.
    #[serde(default, alias = "liquid")]
    pub handles_liquid: bool,
    /// Whether the port handles dry cargo.
    #[serde(default, alias = "dry")]
    pub handles_dry: bool,
}

/// Hull category of a vessel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VesselType {
    /// Liquid bulk carrier.
    Tanker,
    /// Dry bulk carrier.
    #[default]
    #[serde(alias = "dry_bulk", alias = "bulker")]
    Bulk,
    /// Inland barge.
    Barge,
}

/// Commercial arrangement under which a vessel operates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContractType {
    /// Company-owned tonnage.
    #[default]
    Owned,
    /// Chartered for a period at a fixed daily hire.
    #[serde(alias = "tc", alias = "time")]
    TimeCharter,
    /// Chartered for a single voyage.
    #[serde(alias = "spot", alias = "voyage")]
    VoyageCharter,
}

/// Vessel reference data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vessel {
    /// Unique vessel identifier.
    #[serde(alias = "vessel_id")]
    pub id: String,
    /// Vessel name.
    #[serde(default)]
    pub name: String,
    /// Hull category.
    #[serde(default, rename = "type", alias = "vessel_type")]
    pub vessel_type: VesselType,
    /// Class designation, e.g. `river-sea` or `RSD59`.
    #[serde(default, alias = "vessel_class")]
    pub class: String,
    /// Deadweight tonnage.
    #[serde(default, alias = "dwt")]
    pub deadweight: f64,
    /// Cargo capacity in metric tons.
    #[serde(default, alias = "capacity_mt")]
    pub capacity: f64,
    /// Maximum draft in metres.
    #[serde(default, alias = "draft_m")]
    pub draft: f64,
    /// Commercial contract type.
    #[serde(default, alias = "contract")]
    pub contract_type: ContractType,
    /// Fixed daily hire rate for chartered tonnage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_hire: Option<f64>,
    /// Basin the vessel is normally deployed in.
    #[serde(default)]
    pub home_basin: String,
    /// Suitable for liquid cargo.
    #[serde(default, alias = "liquid")]
    pub carries_liquid: bool,
    /// Suitable for dry cargo.
    #[serde(default, alias = "dry")]
    pub carries_dry: bool,
    /// Set on vessels synthesised for ids missing from the reference data.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub placeholder: bool,
}

impl Vessel {
    /// Build a stand-in for a vessel id absent from the reference set.
    pub fn placeholder(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            vessel_type: VesselType::default(),
            class: String::new(),
            deadweight: 0.0,
            capacity: 0.0,
            draft: 0.0,
            contract_type: ContractType::default(),
            daily_hire: None,
            home_basin: String::new(),
            carries_liquid: false,
            carries_dry: false,
            placeholder: true,
        }
    }

    /// Whether the vessel operates on inland waterways and can hand cargo over to sea tonnage.
    pub fn is_river_sea(&self) -> bool {
        self.vessel_type == VesselType::Barge || RIVER_SEA_CLASS_RE.is_match(&self.class)
    }
}

/// Half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Inclusive start.
    pub start: DateTime<Utc>,
    /// Exclusive end.
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a window; `end` must not precede `start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        debug_assert!(end >= start, "time window ends before it starts");
        Self { start, end }
    }

    /// Elapsed time covered by the window.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Zero-length windows describe instantaneous events.
    pub fn is_instant(&self) -> bool {
        self.start == self.end
    }

    /// Returns `true` when both windows share a non-empty stretch of time.
    ///
    /// Instantaneous windows never intersect anything.
    pub fn intersects(&self, other: &Self) -> bool {
        if self.is_instant() || other.is_instant() {
            return false;
        }
        self.start < other.end && other.start < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn half_open_windows_touching_do_not_intersect() {
        let first = TimeWindow::new(at(1, 0), at(3, 0));
        let second = TimeWindow::new(at(3, 0), at(4, 0));
        assert!(!first.intersects(&second));
        assert!(!second.intersects(&first));
    }

    #[test]
    fn overlapping_windows_intersect() {
        let first = TimeWindow::new(at(1, 0), at(3, 0));
        let second = TimeWindow::new(at(2, 12), at(4, 0));
        assert!(first.intersects(&second));
        assert!(second.intersects(&first));
    }

    #[test]
    fn instants_never_intersect() {
        let span = TimeWindow::new(at(1, 0), at(5, 0));
        let instant = TimeWindow::new(at(2, 0), at(2, 0));
        assert!(instant.is_instant());
        assert!(!span.intersects(&instant));
        assert!(!instant.intersects(&span));
    }

    #[test]
    fn river_sea_flag_follows_class_and_type() {
        let mut vessel = Vessel::placeholder("V1");
        assert!(!vessel.is_river_sea());

        vessel.class = "River-Sea 5000".to_string();
        assert!(vessel.is_river_sea());

        // project codes usually carry the project number attached
        for class in ["RSD59", "RSD 59", "rsd-49", "M-SP3.5", "MSP 3,5", "O-PR2"] {
            vessel.class = class.to_string();
            assert!(vessel.is_river_sea(), "{class} should be river-sea");
        }

        for class in ["Handysize", "Versus", "RSX", "Mspec"] {
            vessel.class = class.to_string();
            assert!(!vessel.is_river_sea(), "{class} should be sea-going");
        }

        vessel.class = "Handysize".to_string();
        vessel.vessel_type = VesselType::Barge;
        assert!(vessel.is_river_sea());
    }

    #[test]
    fn vessel_reference_accepts_aliases() {
        let vessel: Vessel = serde_json::from_str(
            r#"{"vessel_id": "V7", "name": "Volga-7", "vessel_type": "barge", "dwt": 5200.0,
                "contract": "tc", "daily_hire": 4500.0}"#,
        )
        .unwrap();
        assert_eq!(vessel.id, "V7");
        assert_eq!(vessel.vessel_type, VesselType::Barge);
        assert_eq!(vessel.contract_type, ContractType::TimeCharter);
        assert_eq!(vessel.daily_hire, Some(4500.0));
        assert!(!vessel.placeholder);
    }
}
