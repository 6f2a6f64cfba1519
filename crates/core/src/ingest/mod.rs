//! Record ingestion: loading, caching, watching and leg normalization.

mod cache;
/// Data directory loading.
pub mod loader;
mod normalizer;
mod record;
/// Record schemas.
pub mod source;
mod warning;
/// Filesystem change notifications.
pub mod watch;

pub use cache::RecordCache;
pub use loader::{DataLoader, PlanningInput};
pub use normalizer::{LegNormalizer, NormalizedLegs};
pub use record::RawRecord;
pub use source::{DetailedLegSource, ExpansionPolicy, LegSource, SummaryLegSource};
pub use warning::IngestWarning;
pub use watch::{DataWatcher, WatchEvent};
