#![allow(missing_docs)]

use thiserror::Error;

/// Non-fatal input defect: the offending record is skipped and the run continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestWarning {
    /// Neither the detailed nor the summary schema matches the record's fields.
    #[error("{record}: unrecognised record schema")]
    UnrecognizedSchema { record: String },
    /// A field the detected schema requires is absent or empty.
    #[error("{record}: missing required field `{field}`")]
    MissingField { record: String, field: &'static str },
    /// A timestamp field holds a value no supported notation accepts.
    #[error("{record}: cannot parse `{field}` value {value:?} as a timestamp")]
    UnparsableTimestamp {
        record: String,
        field: &'static str,
        value: String,
    },
    /// A field holds a value outside its vocabulary or range.
    #[error("{record}: invalid `{field}` value {value:?}")]
    InvalidField {
        record: String,
        field: &'static str,
        value: String,
    },
    /// The leg ends before it starts.
    #[error("{record}: leg ends before it starts")]
    InvertedInterval { record: String },
    /// A leg id was already produced by an earlier record.
    #[error("{record}: leg id `{leg_id}` already ingested, keeping the first occurrence")]
    DuplicateLeg { record: String, leg_id: String },
}

impl IngestWarning {
    /// Locator of the record the warning refers to.
    pub fn record(&self) -> &str {
        match self {
            Self::UnrecognizedSchema { record }
            | Self::MissingField { record, .. }
            | Self::UnparsableTimestamp { record, .. }
            | Self::InvalidField { record, .. }
            | Self::InvertedInterval { record }
            | Self::DuplicateLeg { record, .. } => record,
        }
    }
}
