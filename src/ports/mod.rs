//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the domain/usecases layer
//! requires from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `RemoteTableClient`: Named-table queries against the remote store
//! - `Clock`: Wall-clock time for cache freshness
//! - `CacheObserver`: Rebuild and cache telemetry hooks

pub mod clock;
pub mod observer;
pub mod table_client;
