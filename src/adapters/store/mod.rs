//! Remote Table Store Adapter
//!
//! Implements the `RemoteTableClient` port against a PostgREST-style
//! HTTP table store, plus a transport-level timeout decorator usable
//! with any client.
//!
//! Sub-modules:
//! - `client`: HTTP client with concurrency and rate limiting
//! - `timeout`: Per-call timeout wrapper
//! - `types`: Response parsing helpers

pub mod client;
pub mod timeout;
pub mod types;

pub use client::{StoreClient, StoreClientConfig};
pub use timeout::TimeoutTableClient;
