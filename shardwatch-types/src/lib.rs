//! # shardwatch-types
//!
//! Core types for sharded gateway status reporting. This crate defines the
//! data model shared by the aggregation core, the upstream adapters and the
//! HTTP surface consumed by the status page.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: Core types work without any serialization framework
//! - **Optional serialization**: Enable the `serde` feature for JSON
//! - **Closed labels**: Shard, cluster and incident states are enums, not strings
//! - **Ergonomic builders**: Fluent API for constructing telemetry snapshots
//!
//! ## Features
//!
//! - `std` (default): Standard library support (`Timestamp::now`)
//! - `serde`: serialization via serde
//!
//! ## Example
//!
//! ```rust
//! use shardwatch_types::{TelemetrySnapshot, Timestamp};
//!
//! let snapshot = TelemetrySnapshot::builder()
//!     .taken_at(Timestamp::from_secs(1_700_000_000))
//!     .max_concurrency(16)
//!     .cluster(0, |c| {
//!         c.shard(0, |s| s.connected().latency(42))
//!          .shard(1, |s| s.connected().latency(38))
//!     })
//!     .cluster(1, |c| c.shard(2, |s| s.latency(900)))
//!     .build();
//!
//! assert_eq!(snapshot.num_shards(), 3);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod cluster;
mod incident;
mod shard;
mod status;
mod timestamp;

pub use cluster::*;
pub use incident::*;
pub use shard::*;
pub use status::*;
pub use timestamp::*;

/// Maximum length of an incident name, in characters.
pub const NAME_MAX_LEN: usize = 100;

/// Maximum length of an incident description or update text, in characters.
pub const TEXT_MAX_LEN: usize = 1800;
