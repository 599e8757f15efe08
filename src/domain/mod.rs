//! Domain layer - Core market-data logic and models.
//!
//! Pure normalization, territory extraction, metrics and classification.
//! No I/O and no async here (hexagonal architecture inner ring).
//! All types are serializable and testable in isolation.

pub mod classify;
pub mod metrics;
pub mod normalizer;
pub mod record;
pub mod snapshot;
pub mod territory;
pub mod views;

// Re-export core types for convenience
pub use classify::TableDescriptor;
pub use metrics::MarketMetricsSnapshot;
pub use record::{
    Industry, NormalizedCategory, NormalizedCompany, NormalizedProcedure, RawRecord, RawRow,
    RecordKind, RegionalPayload, SourceKind, SourceSpec,
};
pub use snapshot::{AggregationSnapshot, SourceOutcome, SourceReport};
pub use territory::TerritoryAggregate;
pub use views::SearchFilters;
