//! Cluster and fleet summaries, and the telemetry snapshot they are built from.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::fmt;

use crate::{ShardRecord, ShardRecordBuilder, Timestamp};

/// Rolled-up health of one cluster process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ClusterStatus {
    /// Every shard is up.
    Operational,
    /// Some shards are up.
    Degraded,
    /// No shard is up.
    Down,
    /// No shards reported yet.
    #[default]
    Unknown,
}

impl ClusterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterStatus::Operational => "operational",
            ClusterStatus::Degraded => "degraded",
            ClusterStatus::Down => "down",
            ClusterStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one cluster process and its shards.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cluster {
    pub id: u32,

    /// Mean latency in milliseconds over the shards that are up.
    pub avg_latency: f64,

    pub shards_up: u32,

    /// True iff the cluster has shards and all of them are up.
    pub up: bool,

    pub status: ClusterStatus,

    /// Member shards ordered by shard id, `None` when not loaded yet.
    pub shards: Option<Vec<ShardRecord>>,
}

impl Cluster {
    /// Number of member shards (0 when not loaded).
    pub fn num_shards(&self) -> u32 {
        self.shards.as_ref().map_or(0, |s| s.len() as u32)
    }

    /// Look up a member shard by index.
    pub fn shard(&self, shard_id: u32) -> Option<&ShardRecord> {
        let shards = self.shards.as_ref()?;
        shards
            .binary_search_by_key(&shard_id, |s| s.shard_id)
            .ok()
            .map(|i| &shards[i])
    }
}

/// Fleet-wide rollup over every cluster.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FleetWrapper {
    /// Latency in milliseconds, weighted by the samples behind each cluster.
    pub avg_latency: f64,

    /// Maximum shards a single cluster process may start at once.
    ///
    /// Configuration pass-through, not derived from the shards.
    pub max_concurrency: u32,

    pub num_shards: u32,

    pub shards_up: u32,

    /// Cluster summaries ordered by cluster id.
    pub clusters: Vec<Cluster>,
}

impl FleetWrapper {
    /// Whether the fleet has any shard information at all.
    pub fn is_empty(&self) -> bool {
        self.num_shards == 0
    }

    /// Number of shards that are down.
    pub fn shards_down(&self) -> u32 {
        self.num_shards.saturating_sub(self.shards_up)
    }

    /// Find the cluster that owns a given shard.
    pub fn cluster_of(&self, shard_id: u32) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.shard(shard_id).is_some())
    }
}

/// A point-in-time view of raw shard telemetry.
///
/// This is the immutable input to aggregation: shards grouped by the
/// cluster that reported them, plus the configured start concurrency.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TelemetrySnapshot {
    /// When the snapshot was taken.
    pub taken_at: Timestamp,

    pub max_concurrency: u32,

    /// Raw shard records per cluster id, `None` when a cluster has not
    /// reported its shards yet.
    pub clusters: BTreeMap<u32, Option<Vec<ShardRecord>>>,
}

impl TelemetrySnapshot {
    /// Create an empty snapshot taken at `taken_at`.
    pub fn new(taken_at: Timestamp) -> Self {
        Self {
            taken_at,
            ..Default::default()
        }
    }

    /// Create a builder for constructing snapshots.
    pub fn builder() -> TelemetrySnapshotBuilder {
        TelemetrySnapshotBuilder::default()
    }

    /// Total shard records across every cluster.
    pub fn num_shards(&self) -> usize {
        self.clusters
            .values()
            .map(|s| s.as_ref().map_or(0, Vec::len))
            .sum()
    }

    /// Iterate over every shard record.
    pub fn shards(&self) -> impl Iterator<Item = &ShardRecord> {
        self.clusters.values().flatten().flatten()
    }
}

/// Builder for `TelemetrySnapshot`.
#[derive(Debug, Default)]
pub struct TelemetrySnapshotBuilder {
    snapshot: TelemetrySnapshot,
}

impl TelemetrySnapshotBuilder {
    /// Set the snapshot instant.
    pub fn taken_at(mut self, at: impl Into<Timestamp>) -> Self {
        self.snapshot.taken_at = at.into();
        self
    }

    /// Set the start concurrency.
    pub fn max_concurrency(mut self, max_concurrency: u32) -> Self {
        self.snapshot.max_concurrency = max_concurrency;
        self
    }

    /// Add a cluster whose shards are built with a closure.
    pub fn cluster<F>(mut self, cluster_id: u32, f: F) -> Self
    where
        F: FnOnce(ClusterShardsBuilder) -> ClusterShardsBuilder,
    {
        let shards = f(ClusterShardsBuilder::new(cluster_id)).shards;
        self.snapshot.clusters.insert(cluster_id, Some(shards));
        self
    }

    /// Add a cluster that has not reported its shards yet.
    pub fn pending_cluster(mut self, cluster_id: u32) -> Self {
        self.snapshot.clusters.insert(cluster_id, None);
        self
    }

    /// Build the snapshot.
    pub fn build(self) -> TelemetrySnapshot {
        self.snapshot
    }
}

/// Collects the shards of one cluster inside [`TelemetrySnapshotBuilder::cluster`].
#[derive(Debug)]
pub struct ClusterShardsBuilder {
    cluster_id: u32,
    shards: Vec<ShardRecord>,
}

impl ClusterShardsBuilder {
    fn new(cluster_id: u32) -> Self {
        Self {
            cluster_id,
            shards: Vec::new(),
        }
    }

    /// Add a shard built with a closure. The cluster id is filled in.
    pub fn shard<F>(mut self, shard_id: u32, f: F) -> Self
    where
        F: FnOnce(ShardRecordBuilder) -> ShardRecordBuilder,
    {
        let record = f(ShardRecord::builder(shard_id).cluster(self.cluster_id)).build();
        self.shards.push(record);
        self
    }
}
