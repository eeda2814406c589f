//! # shardwatch-adapters
//!
//! Boundary between the upstream gateway API and the shardwatch data model.
//!
//! Payloads arrive with free-text status labels and raw epoch integers.
//! The converters in [`wire`] turn them into closed enums and millisecond
//! [`Timestamp`]s so the core never sees either.
//!
//! ## Features
//!
//! - `http` (default): [`gateway::GatewayClient`] for fetching cluster
//!   telemetry and incidents over HTTP
//!
//! ## Quick Start
//!
//! ```rust
//! use shardwatch_adapters::{ClustersPayload, TimestampUnit};
//! use shardwatch_types::Timestamp;
//!
//! let payload: ClustersPayload = serde_json::from_str(
//!     r#"{"max_concurrency": 1, "clusters": [{"id": 0, "shards": [
//!         {"shard_id": 0, "up": true, "status": "connected", "latency": 40}
//!     ]}]}"#,
//! ).unwrap();
//!
//! let snapshot = payload.into_snapshot(TimestampUnit::Millis, Timestamp::NEVER, None);
//! assert_eq!(snapshot.num_shards(), 1);
//! ```

pub mod error;
pub mod wire;

#[cfg(feature = "http")]
pub mod gateway;

pub use error::AdapterError;
pub use wire::{
    parse_instant, ClusterPayload, ClustersPayload, IncidentPayload, ShardPayload,
    TimestampUnit, UpdatePayload,
};

// Re-export types for convenience
pub use shardwatch_types::{Incident, TelemetrySnapshot, Timestamp};
