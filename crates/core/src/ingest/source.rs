//! Record schemas understood by the leg normalizer.

use chrono::Duration;

use super::{IngestWarning, RawRecord};
use crate::models::{LegStatus, LegType, OperationGroup, TimeWindow, VoyageLeg};
use crate::time::days;

/// A parsing strategy turning one raw record into canonical legs.
pub trait LegSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether the record carries the fields this schema is recognised by.
    fn accepts(&self, record: &RawRecord) -> bool;

    /// Produce the legs described by the record, or the defect that disqualifies it.
    fn expand(&self, record: &RawRecord) -> Result<Vec<VoyageLeg>, IngestWarning>;
}

/// Default durations used when a summary record is expanded into legs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpansionPolicy {
    /// Duration of the synthesised loading leg.
    pub loading: Duration,
    /// Minimum duration of the synthesised laden passage.
    pub transit: Duration,
    /// Duration of the synthesised discharge leg.
    pub discharge: Duration,
}

impl Default for ExpansionPolicy {
    fn default() -> Self {
        Self {
            loading: days(2),
            transit: days(10),
            discharge: days(2),
        }
    }
}

/// Records that already describe a single leg (`leg_seq`, `start_time`, `end_time`, ...).
#[derive(Debug, Clone, Copy, Default)]
pub struct DetailedLegSource;

impl LegSource for DetailedLegSource {
    fn name(&self) -> &'static str {
        "detailed"
    }

    fn accepts(&self, record: &RawRecord) -> bool {
        record.has("leg_seq") && record.has("start_time")
    }

    fn expand(&self, record: &RawRecord) -> Result<Vec<VoyageLeg>, IngestWarning> {
        let voyage_id = record.require_text("voyage_id", &[])?;
        let seq = parse_seq(record)?;
        let vessel_id = record.require_text("vessel_id", &["vessel"])?;

        let op_raw = record.require_text("op_group", &["operation"])?;
        let op_group = OperationGroup::parse(&op_raw).ok_or_else(|| IngestWarning::InvalidField {
            record: record.locator(),
            field: "op_group",
            value: op_raw.clone(),
        })?;
        let leg_type = match record.text("leg_type") {
            Some(raw) => LegType::parse(&raw).ok_or_else(|| IngestWarning::InvalidField {
                record: record.locator(),
                field: "leg_type",
                value: raw,
            })?,
            None => op_group.default_leg_type(),
        };

        let port_start = record.require_text("port_start", &["start_port", "port"])?;
        let port_end = record
            .text_any(&["port_end", "end_port"])
            .unwrap_or_else(|| port_start.clone());

        let start = record.require_timestamp("start_time")?;
        let end = record.require_timestamp("end_time")?;
        if end < start {
            return Err(IngestWarning::InvertedInterval {
                record: record.locator(),
            });
        }

        let quantity = parse_quantity(record)?;
        let status = parse_status(record)?;
        let id = record
            .text("leg_id")
            .unwrap_or_else(|| format!("{voyage_id}-{seq}"));

        Ok(vec![VoyageLeg {
            id,
            voyage_id,
            seq,
            vessel_id,
            op_group,
            op_detail: record.text_any(&["op_detail", "operation_detail"]).unwrap_or_default(),
            leg_type,
            port_start,
            port_end,
            berth_id: record.text("berth_id"),
            cargo_id: record.text_any(&["cargo_id", "cargo_lot"]),
            quantity,
            window: TimeWindow::new(start, end),
            status,
            remarks: record.text("remarks").unwrap_or_default(),
        }])
    }
}

/// Voyage-level records (load port, discharge port, laycan) expanded into three legs.
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryLegSource {
    policy: ExpansionPolicy,
}

impl SummaryLegSource {
    /// Expand with the given default durations.
    pub fn new(policy: ExpansionPolicy) -> Self {
        Self { policy }
    }
}

impl LegSource for SummaryLegSource {
    fn name(&self) -> &'static str {
        "summary"
    }

    fn accepts(&self, record: &RawRecord) -> bool {
        record.has("laycan_start") || (record.has("load_port") && record.has("disch_port"))
    }

    fn expand(&self, record: &RawRecord) -> Result<Vec<VoyageLeg>, IngestWarning> {
        let voyage_id = record.require_text("voyage_id", &["id"])?;
        let vessel_id = record.require_text("vessel_id", &["vessel"])?;
        let load_port = record.require_text("load_port", &[])?;
        let disch_port = record.require_text("disch_port", &["discharge_port"])?;
        let laycan_start = record.require_timestamp("laycan_start")?;
        let laycan_end = record.optional_timestamp("laycan_end")?;
        let quantity = parse_quantity(record)?;
        let status = parse_status(record)?;
        let cargo_type = record.text("cargo_type").unwrap_or_default();

        let loading = TimeWindow::new(laycan_start, laycan_start + self.policy.loading);
        let estimate = loading.end + self.policy.transit;
        let transit_end = match laycan_end {
            Some(laycan_end) if laycan_end > estimate => laycan_end,
            _ => estimate,
        };
        let transit = TimeWindow::new(loading.end, transit_end);
        let discharge = TimeWindow::new(transit.end, transit.end + self.policy.discharge);

        let leg = |seq: u32, op_group: OperationGroup, detail: String, from: &str, to: &str, window| {
            VoyageLeg {
                id: format!("{voyage_id}-{seq}"),
                voyage_id: voyage_id.clone(),
                seq,
                vessel_id: vessel_id.clone(),
                op_group,
                op_detail: detail,
                leg_type: op_group.default_leg_type(),
                port_start: from.to_string(),
                port_end: to.to_string(),
                berth_id: None,
                cargo_id: Some(voyage_id.clone()),
                quantity,
                window,
                status,
                remarks: String::new(),
            }
        };

        Ok(vec![
            leg(
                1,
                OperationGroup::Loading,
                describe("Loading", &cargo_type),
                &load_port,
                &load_port,
                loading,
            ),
            leg(
                2,
                OperationGroup::LadenTransit,
                format!("Laden passage {load_port} - {disch_port}"),
                &load_port,
                &disch_port,
                transit,
            ),
            leg(
                3,
                OperationGroup::Discharge,
                describe("Discharge", &cargo_type),
                &disch_port,
                &disch_port,
                discharge,
            ),
        ])
    }
}

fn describe(operation: &str, cargo_type: &str) -> String {
    if cargo_type.is_empty() {
        operation.to_string()
    } else {
        format!("{operation} {cargo_type}")
    }
}

fn parse_seq(record: &RawRecord) -> Result<u32, IngestWarning> {
    let raw = record.require_text("leg_seq", &[])?;
    raw.parse::<u32>()
        .ok()
        .or_else(|| {
            // spreadsheets export integer columns as `3.0`
            raw.parse::<f64>()
                .ok()
                .filter(|value| value.fract() == 0.0 && *value >= 0.0 && *value <= u32::MAX as f64)
                .map(|value| value as u32)
        })
        .ok_or_else(|| IngestWarning::InvalidField {
            record: record.locator(),
            field: "leg_seq",
            value: raw,
        })
}

fn parse_quantity(record: &RawRecord) -> Result<f64, IngestWarning> {
    let quantity = record
        .optional_number("qty_mt", &["quantity", "qty"])?
        .unwrap_or(0.0);
    if quantity < 0.0 {
        return Err(IngestWarning::InvalidField {
            record: record.locator(),
            field: "qty_mt",
            value: quantity.to_string(),
        });
    }
    Ok(quantity)
}

fn parse_status(record: &RawRecord) -> Result<LegStatus, IngestWarning> {
    match record.text("status") {
        Some(raw) => LegStatus::parse(&raw).ok_or_else(|| IngestWarning::InvalidField {
            record: record.locator(),
            field: "status",
            value: raw,
        }),
        None => Ok(LegStatus::Planned),
    }
}
