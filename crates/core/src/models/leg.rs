use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TimeWindow;

/// Fixed vocabulary of operations a leg can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationGroup {
    /// Cargo loading alongside.
    Loading,
    /// Cargo discharge alongside.
    Discharge,
    /// Sea passage with cargo aboard.
    LadenTransit,
    /// Sea passage without cargo.
    BallastTransit,
    /// Canal or inland waterway passage.
    CanalTransit,
    /// Fuel replenishment.
    Bunkering,
    /// Idle time, e.g. awaiting a berth or weather.
    Waiting,
}

impl OperationGroup {
    /// Parse the loose labels used by upstream systems (`load`, `laden`, `Discharging`, ...).
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase().replace(['-', '_'], " ");
        let group = match normalized.as_str() {
            "loading" | "load" => Self::Loading,
            "discharge" | "discharging" | "disch" | "unloading" => Self::Discharge,
            "laden" | "laden transit" | "laden passage" => Self::LadenTransit,
            "ballast" | "ballast transit" | "ballast passage" => Self::BallastTransit,
            "canal" | "canal transit" => Self::CanalTransit,
            "bunkering" | "bunker" => Self::Bunkering,
            "waiting" | "wait" | "idle" => Self::Waiting,
            _ => return None,
        };
        Some(group)
    }

    /// Leg type implied by the operation when the record does not name one.
    pub fn default_leg_type(self) -> LegType {
        match self {
            Self::LadenTransit | Self::BallastTransit => LegType::Sea,
            Self::CanalTransit => LegType::Canal,
            Self::Loading | Self::Discharge | Self::Bunkering | Self::Waiting => LegType::Port,
        }
    }
}

impl fmt::Display for OperationGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Loading => "loading",
            Self::Discharge => "discharge",
            Self::LadenTransit => "laden",
            Self::BallastTransit => "ballast",
            Self::CanalTransit => "canal",
            Self::Bunkering => "bunkering",
            Self::Waiting => "waiting",
        };
        f.write_str(label)
    }
}

/// Physical setting of a leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegType {
    /// Alongside or at anchor in a port.
    Port,
    /// Open-water passage.
    Sea,
    /// Canal passage.
    Canal,
}

impl LegType {
    /// Parse a leg type label.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "port" => Some(Self::Port),
            "sea" => Some(Self::Sea),
            "canal" => Some(Self::Canal),
            _ => None,
        }
    }
}

/// Execution status reported by the source-of-truth system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LegStatus {
    /// Not started.
    #[default]
    Planned,
    /// Under way.
    #[serde(rename = "In Process")]
    InProcess,
    /// Finished.
    Completed,
}

impl LegStatus {
    /// Parse a status label, tolerating case and separator differences.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase().replace(['-', '_'], " ");
        match normalized.as_str() {
            "planned" | "plan" | "scheduled" => Some(Self::Planned),
            "in process" | "in progress" | "inprocess" | "active" => Some(Self::InProcess),
            "completed" | "complete" | "done" | "finished" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Atomic unit of time and resource occupancy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoyageLeg {
    /// Unique leg identifier.
    pub id: String,
    /// Owning voyage.
    pub voyage_id: String,
    /// Position within the voyage.
    pub seq: u32,
    /// Vessel performing the leg.
    pub vessel_id: String,
    /// Operation performed.
    pub op_group: OperationGroup,
    /// Free-text operation detail.
    #[serde(default)]
    pub op_detail: String,
    /// Physical setting.
    pub leg_type: LegType,
    /// Port the leg starts at.
    pub port_start: String,
    /// Port the leg ends at.
    pub port_end: String,
    /// Berth occupied during the leg, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub berth_id: Option<String>,
    /// Cargo lot handled during the leg, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cargo_id: Option<String>,
    /// Quantity in metric tons.
    pub quantity: f64,
    /// Time the leg occupies.
    pub window: TimeWindow,
    /// Execution status.
    pub status: LegStatus,
    /// Free-text remarks.
    #[serde(default)]
    pub remarks: String,
}

impl VoyageLeg {
    /// Start timestamp.
    pub fn start(&self) -> DateTime<Utc> {
        self.window.start
    }

    /// End timestamp.
    pub fn end(&self) -> DateTime<Utc> {
        self.window.end
    }

    /// Whether the leg starts or ends at `port`.
    pub fn touches_port(&self, port: &str) -> bool {
        self.port_start == port || self.port_end == port
    }
}
