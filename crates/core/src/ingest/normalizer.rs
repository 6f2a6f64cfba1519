use std::collections::HashSet;

use tracing::{debug, warn};

use super::{DetailedLegSource, ExpansionPolicy, IngestWarning, LegSource, RawRecord, SummaryLegSource};
use crate::models::VoyageLeg;

/// Canonical legs plus the defects of the records that were skipped.
#[derive(Debug, Clone, Default)]
pub struct NormalizedLegs {
    /// Legs in record order; ids are unique.
    pub legs: Vec<VoyageLeg>,
    /// One entry per skipped record or dropped duplicate.
    pub warnings: Vec<IngestWarning>,
}

/// Converts raw operation records into canonical legs.
///
/// Each record is offered to the registered [`LegSource`]s in order and parsed by the
/// first that accepts it.
pub struct LegNormalizer {
    sources: Vec<Box<dyn LegSource>>,
}

impl LegNormalizer {
    /// Normalizer understanding the detailed and summary schemas.
    pub fn new(policy: ExpansionPolicy) -> Self {
        Self::with_sources(vec![
            Box::new(DetailedLegSource),
            Box::new(SummaryLegSource::new(policy)),
        ])
    }

    /// Normalizer with an explicit set of schemas, tried in order.
    pub fn with_sources(sources: Vec<Box<dyn LegSource>>) -> Self {
        Self { sources }
    }

    /// Normalize a batch. Defective records are skipped and reported, never fatal.
    pub fn normalize<'a>(&self, records: impl IntoIterator<Item = &'a RawRecord>) -> NormalizedLegs {
        let mut out = NormalizedLegs::default();
        let mut seen = HashSet::new();

        for record in records {
            let Some(source) = self.sources.iter().find(|source| source.accepts(record)) else {
                self.skip(
                    &mut out,
                    IngestWarning::UnrecognizedSchema {
                        record: record.locator(),
                    },
                );
                continue;
            };

            match source.expand(record) {
                Ok(legs) => {
                    debug!(record = %record.locator(), schema = source.name(), legs = legs.len(), "Record normalized");
                    for leg in legs {
                        if seen.insert(leg.id.clone()) {
                            out.legs.push(leg);
                        } else {
                            self.skip(
                                &mut out,
                                IngestWarning::DuplicateLeg {
                                    record: record.locator(),
                                    leg_id: leg.id,
                                },
                            );
                        }
                    }
                }
                Err(defect) => self.skip(&mut out, defect),
            }
        }

        out
    }

    fn skip(&self, out: &mut NormalizedLegs, defect: IngestWarning) {
        warn!("Skipping {defect}");
        out.warnings.push(defect);
    }
}

impl Default for LegNormalizer {
    fn default() -> Self {
        Self::new(ExpansionPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OperationGroup;
    use serde_json::json;

    fn batch(values: Vec<serde_json::Value>) -> Vec<RawRecord> {
        values
            .into_iter()
            .enumerate()
            .map(|(index, value)| RawRecord::from_value("batch.json", index, value))
            .collect()
    }

    fn summary(voyage_id: &str) -> serde_json::Value {
        json!({
            "voyage_id": voyage_id,
            "vessel_id": "V1",
            "load_port": "A",
            "disch_port": "B",
            "laycan_start": "2024-03-01 08:00",
            "laycan_end": "2024-03-09"
        })
    }

    #[test]
    fn mixed_batch_keeps_valid_records() {
        let records = batch(vec![
            summary("S-1"),
            json!({
                "voyage_id": "D-1", "leg_seq": 1, "vessel_id": "V2", "op_group": "loading",
                "port_start": "OYA", "start_time": "2024-03-01", "end_time": "2024-03-02"
            }),
            json!({
                "voyage_id": "D-1", "leg_seq": 2, "vessel_id": "V2", "op_group": "laden",
                "port_start": "OYA", "port_end": "BAKU", "start_time": "garbage", "end_time": "2024-03-04"
            }),
            json!({"comment": "stray row"}),
        ]);

        let normalized = LegNormalizer::default().normalize(&records);
        assert_eq!(normalized.legs.len(), 4);
        assert_eq!(normalized.warnings.len(), 2);
        assert!(matches!(
            normalized.warnings[0],
            IngestWarning::UnparsableTimestamp { field: "start_time", .. }
        ));
        assert!(matches!(
            normalized.warnings[1],
            IngestWarning::UnrecognizedSchema { .. }
        ));
        assert_eq!(normalized.warnings[1].record(), "batch.json#3");
    }

    #[test]
    fn duplicate_leg_ids_keep_first_occurrence() {
        let records = batch(vec![
            json!({
                "leg_id": "L-1", "voyage_id": "D-1", "leg_seq": 1, "vessel_id": "V2",
                "op_group": "loading", "port_start": "OYA",
                "start_time": "2024-03-01", "end_time": "2024-03-02"
            }),
            json!({
                "leg_id": "L-1", "voyage_id": "D-1", "leg_seq": 2, "vessel_id": "V2",
                "op_group": "waiting", "port_start": "OYA",
                "start_time": "2024-03-02", "end_time": "2024-03-03"
            }),
        ]);

        let normalized = LegNormalizer::default().normalize(&records);
        assert_eq!(normalized.legs.len(), 1);
        assert_eq!(normalized.legs[0].op_group, OperationGroup::Loading);
        assert!(matches!(
            &normalized.warnings[0],
            IngestWarning::DuplicateLeg { leg_id, .. } if leg_id == "L-1"
        ));
    }

    #[test]
    fn summary_expansion_is_structurally_repeatable() {
        let records = batch(vec![summary("S-1"), summary("S-2")]);
        let normalized = LegNormalizer::default().normalize(&records);
        let (first, second): (Vec<_>, Vec<_>) = normalized
            .legs
            .iter()
            .partition(|leg| leg.voyage_id == "S-1");

        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 3);
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.seq, b.seq);
            assert_eq!(a.op_group, b.op_group);
            assert_eq!(a.window, b.window);
            assert_ne!(a.id, b.id);
        }
    }
}
