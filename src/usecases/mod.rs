//! Use Cases Layer - Application Workflows
//!
//! Orchestrates domain logic with port interfaces to implement the
//! engine's operations.
//!
//! Use cases:
//! - `SnapshotRebuilder`: Concurrent source fan-out and snapshot assembly
//! - `AggregationCache`: TTL-bounded snapshot with rebuild coalescing
//! - `TableDiscovery`: On-demand description of remote tables
//! - `MarketIntelService`: Caller-facing entry point and read-side views

pub mod aggregation_cache;
pub mod discovery;
pub mod market_service;
pub mod rebuild;

pub use aggregation_cache::AggregationCache;
pub use discovery::TableDiscovery;
pub use market_service::MarketIntelService;
pub use rebuild::SnapshotRebuilder;
