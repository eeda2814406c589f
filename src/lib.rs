//! # shardwatch
//!
//! A status service for sharded gateways. It turns raw per-shard telemetry
//! into cluster and fleet health rollups, keeps a timeline of incidents,
//! and serves both as a JSON API for a status page.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  ┌─────────┐   refresh   ┌───────────┐                       │
//! │  │ source  │────────────▶│ AppState  │◀─── server (hyper)    │
//! │  │ (input) │  aggregate  │ fleet+book│                       │
//! │  └─────────┘             └─────┬─────┘                       │
//! │   File | Http | Channel        │ events                      │
//! │                                ▼                             │
//! │                          ┌───────────┐                       │
//! │                          │   store   │ incidents.json        │
//! │                          └───────────┘                       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`source`]**: the [`TelemetrySource`] trait with file, upstream HTTP
//!   and channel implementations
//! - **[`server`]**: the JSON API and the refresh task feeding it
//! - **[`store`]**: incident persistence
//! - **[`config`]** and **[`logging`]**: service settings and tracing setup
//!
//! The domain logic lives in `shardwatch-core`; wire formats and the
//! upstream client live in `shardwatch-adapters`.
//!
//! ## Usage
//!
//! ```bash
//! # Serve the API from a local telemetry file
//! shardwatch serve --telemetry clusters.json --incidents incidents.json
//!
//! # Which shard handles a guild?
//! shardwatch shard 81384788765712384 --shards 16
//! ```
//!
//! ### As a library
//!
//! ```
//! use std::sync::Arc;
//! use shardwatch::{refresh_once, AppState, ChannelSource};
//! use shardwatch_core::IncidentBook;
//! use shardwatch_types::TelemetrySnapshot;
//!
//! let state = AppState::new(Arc::new(IncidentBook::new()), false);
//! let (tx, mut source) = ChannelSource::create("embedded");
//!
//! tx.send(TelemetrySnapshot::builder()
//!     .cluster(0, |c| c.shard(0, |s| s.connected().latency(42)))
//!     .build()).unwrap();
//!
//! assert!(refresh_once(&mut source, &state));
//! assert_eq!(state.latest_fleet().unwrap().shards_up, 1);
//! ```

pub mod config;
pub mod logging;
pub mod server;
pub mod source;
pub mod store;

pub use config::Settings;
pub use server::{refresh_once, spawn_refresh, AppState};
pub use source::{ChannelSource, FileSource, HttpSource, TelemetrySource};
pub use store::{IncidentStore, StoreError};
