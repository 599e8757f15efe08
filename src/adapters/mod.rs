//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies. Each sub-module groups adapters by
//! infrastructure concern.
//!
//! Adapter categories:
//! - `store`: PostgREST-style table store client and timeout decorator
//! - `metrics`: Prometheus metrics export and health/diagnostic endpoints

pub mod metrics;
pub mod store;
