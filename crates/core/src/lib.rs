#![warn(clippy::all, missing_docs)]

//! Core planning logic for Olya transshipment.
//!
//! This crate normalizes heterogeneous voyage operation records into
//! canonical legs, aggregates them into voyages, pairs river-sea barge
//! discharges with sea-going vessel loadings at transfer nodes, and
//! detects resource conflicts across the resulting schedule.

pub mod config;
pub mod conflict;
pub mod fleet;
pub mod ingest;
pub mod models;
pub mod report;
pub mod run;
pub mod stowage;
pub mod time;
pub mod voyage;

pub use config::AppConfig;
pub use conflict::{ConflictDetector, ConflictKind, ConflictRecord, ConflictReport, Severity};
pub use fleet::Fleet;
pub use ingest::{
    DataLoader, DataWatcher, ExpansionPolicy, IngestWarning, LegNormalizer, PlanningInput,
    RawRecord, RecordCache, WatchEvent,
};
pub use models::{LegStatus, LegType, OperationGroup, Port, TimeWindow, Vessel, VesselType, VoyageLeg};
pub use report::{ReportStore, RunReport};
pub use run::{LegFeed, PlanningRun, PlanningSnapshot, RunOutcome, RunSettings, Strategy};
pub use stowage::{HandoverStatus, MatchPolicy, OlyaSchedule, StowageMatch, TransshipmentMatcher};
pub use voyage::{Voyage, VoyageBook, VoyageStatus};
