//! # shardwatch-core
//!
//! Status aggregation and incident lifecycle for a sharded gateway.
//!
//! Aggregation is pure: it takes an immutable telemetry snapshot and returns
//! new summaries. The only shared state is the [`IncidentBook`], which
//! serializes commands per incident.
//!
//! ## Quick Start
//!
//! ```rust
//! use shardwatch_core::{aggregate_snapshot, summarize, IncidentBook};
//! use shardwatch_types::{FleetStatus, Impact, IncidentDetails, TelemetrySnapshot, Timestamp};
//!
//! let snapshot = TelemetrySnapshot::builder()
//!     .max_concurrency(16)
//!     .cluster(0, |c| c.shard(0, |s| s.connected().latency(100)))
//!     .cluster(1, |c| {
//!         c.shard(1, |s| s.connected().latency(10))
//!          .shard(2, |s| s.connected().latency(10))
//!          .shard(3, |s| s.connected().latency(10))
//!     })
//!     .build();
//!
//! let fleet = aggregate_snapshot(&snapshot);
//! assert_eq!(fleet.avg_latency, 32.5);
//!
//! let book = IncidentBook::new();
//! let now = Timestamp::from_secs(1_700_000_000);
//! book.open(IncidentDetails::new("Elevated latency", Impact::Minor), "Investigating", now)
//!     .unwrap();
//!
//! let summary = summarize(&fleet, &book.active(), now);
//! assert_eq!(summary.status, FleetStatus::Degraded);
//! ```
//!
//! ## Components
//!
//! - **Shard resolver**: exact `(guild_id >> 22) % shards_total` for ids of any length
//! - **Aggregators**: cluster and fleet rollups over up shards
//! - **Timeline**: the incident state machine
//! - **Summary**: the fleet-wide status line
//! - **Book**: concurrent incident store with an event stream

mod aggregate;
mod book;
mod error;
mod shard_id;
mod summary;
mod timeline;

pub use aggregate::{aggregate_cluster, aggregate_fleet, aggregate_snapshot};
pub use book::{IncidentBook, IncidentEvent, PAGE_SIZE};
pub use error::{Error, Result};
pub use shard_id::{resolve_shard, shard_index, UNSHARDED};
pub use summary::summarize;
pub use timeline::{transition_allowed, IncidentTimeline};

// Re-export types for convenience
pub use shardwatch_types::{
    Cluster, FleetStatus, FleetWrapper, Impact, Incident, IncidentId, IncidentList, IncidentStatus,
    IncidentUpdate, ShardRecord, StatusSummary, TelemetrySnapshot, Timestamp,
};
