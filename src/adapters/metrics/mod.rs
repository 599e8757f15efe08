//! Metrics and Monitoring Adapters
//!
//! Provides Prometheus metrics export on :9090 and the health and
//! diagnostics endpoints via axum 0.7.

pub mod health;
pub mod prometheus;

pub use health::{HealthServer, HealthState};
pub use prometheus::MetricsRegistry;
