//! Rolling shard telemetry up into cluster and fleet summaries.
//!
//! Latency policy: only shards that are up contribute latency samples. A
//! down shard reports the last latency it measured, which is stale.

use shardwatch_types::{Cluster, ClusterStatus, FleetWrapper, ShardRecord, TelemetrySnapshot};
use tracing::debug;

/// Summarize one cluster from its member shards.
///
/// `None` means the cluster has not reported its shards yet; it aggregates
/// like an empty cluster but keeps `shards` unset.
pub fn aggregate_cluster(id: u32, shards: Option<Vec<ShardRecord>>) -> Cluster {
    let Some(mut shards) = shards else {
        return Cluster {
            id,
            status: ClusterStatus::Unknown,
            ..Default::default()
        };
    };

    shards.sort_by_key(|s| s.shard_id);

    let (shards_up, latency_sum) = shards
        .iter()
        .filter(|s| s.up)
        .fold((0u32, 0u64), |(n, sum), s| (n + 1, sum + u64::from(s.latency)));

    let avg_latency = if shards_up > 0 {
        latency_sum as f64 / f64::from(shards_up)
    } else {
        0.0
    };

    let total = shards.len() as u32;
    let up = total > 0 && shards_up == total;
    let status = if up {
        ClusterStatus::Operational
    } else if shards_up > 0 {
        ClusterStatus::Degraded
    } else if total == 0 {
        ClusterStatus::Unknown
    } else {
        ClusterStatus::Down
    };

    Cluster {
        id,
        avg_latency,
        shards_up,
        up,
        status,
        shards: Some(shards),
    }
}

/// Roll cluster summaries up into the fleet view.
///
/// The fleet latency weights each cluster mean by the samples behind it,
/// so a one-shard cluster never counts as much as a five-hundred-shard one.
pub fn aggregate_fleet(mut clusters: Vec<Cluster>, max_concurrency: u32) -> FleetWrapper {
    clusters.sort_by_key(|c| c.id);

    let mut num_shards = 0u32;
    let mut shards_up = 0u32;
    let mut weighted = 0.0f64;
    for cluster in &clusters {
        num_shards += cluster.num_shards();
        shards_up += cluster.shards_up;
        weighted += cluster.avg_latency * f64::from(cluster.shards_up);
    }

    let avg_latency = if shards_up > 0 {
        weighted / f64::from(shards_up)
    } else {
        0.0
    };

    FleetWrapper {
        avg_latency,
        max_concurrency,
        num_shards,
        shards_up,
        clusters,
    }
}

/// Run both aggregators over a telemetry snapshot.
pub fn aggregate_snapshot(snapshot: &TelemetrySnapshot) -> FleetWrapper {
    let clusters = snapshot
        .clusters
        .iter()
        .map(|(id, shards)| aggregate_cluster(*id, shards.clone()))
        .collect();
    let fleet = aggregate_fleet(clusters, snapshot.max_concurrency);
    debug!(
        clusters = fleet.clusters.len(),
        num_shards = fleet.num_shards,
        shards_up = fleet.shards_up,
        "Aggregated telemetry snapshot"
    );
    fleet
}
