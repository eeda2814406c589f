//! Upstream payload shapes and their conversion into the data model.
//!
//! Everything that arrives as a loose label or a raw epoch integer is
//! normalized here. Derived fields in the payloads (cluster and fleet
//! averages, counts, statuses) are not trusted; the core recomputes them.

use serde::Deserialize;
use tracing::warn;

use shardwatch_types::{
    Impact, Incident, IncidentId, IncidentStatus, IncidentUpdate, ShardRecord, ShardStatus,
    TelemetrySnapshot, Timestamp, UpdateId,
};

use shardwatch_core::IncidentTimeline;

use crate::AdapterError;

/// Unit of the epoch integers in shard telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampUnit {
    Seconds,
    #[default]
    Millis,
}

impl TimestampUnit {
    /// Convert a raw epoch value. Zero stays the "never" sentinel.
    pub fn normalize(self, raw: u64) -> Timestamp {
        match self {
            TimestampUnit::Seconds => Timestamp::from_secs(raw),
            TimestampUnit::Millis => Timestamp::from_millis(raw),
        }
    }
}

/// `GET /api/v1/clusters` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ClustersPayload {
    #[serde(default)]
    pub max_concurrency: u32,

    #[serde(default)]
    pub clusters: Vec<ClusterPayload>,
}

/// One cluster entry of [`ClustersPayload`].
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterPayload {
    #[serde(alias = "cluster_id")]
    pub id: u32,

    #[serde(default)]
    pub shards: Option<Vec<ShardPayload>>,
}

/// One shard entry of [`ClusterPayload`].
#[derive(Debug, Clone, Deserialize)]
pub struct ShardPayload {
    pub shard_id: u32,

    #[serde(default)]
    pub cluster_id: Option<u32>,

    #[serde(default)]
    pub up: bool,

    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub latency: i64,

    #[serde(default)]
    pub last_heartbeat: Option<u64>,

    #[serde(default)]
    pub last_connection: Option<u64>,

    #[serde(default)]
    pub last_reconnect: Option<u64>,
}

impl ShardPayload {
    /// Normalize into a record owned by `cluster_id`.
    pub fn into_record(self, cluster_id: u32, unit: TimestampUnit) -> ShardRecord {
        if let Some(reported) = self.cluster_id.filter(|c| *c != cluster_id) {
            warn!(
                shard_id = self.shard_id,
                reported,
                cluster_id,
                "Shard listed under a different cluster, using the enclosing one"
            );
        }

        let mut status = ShardStatus::from_label(&self.status).unwrap_or_else(|| {
            warn!(shard_id = self.shard_id, label = %self.status, "Unknown shard status label");
            ShardStatus::Unknown
        });
        if !self.up && status.is_healthy() {
            warn!(
                shard_id = self.shard_id,
                "Shard is down but labeled connected, treating as disconnected"
            );
            status = ShardStatus::Disconnected;
        }

        let latency = u32::try_from(self.latency.max(0)).unwrap_or(u32::MAX);

        ShardRecord {
            shard_id: self.shard_id,
            cluster_id,
            up: self.up,
            status,
            latency,
            last_heartbeat: unit.normalize(self.last_heartbeat.unwrap_or(0)),
            last_connection: unit.normalize(self.last_connection.unwrap_or(0)),
            last_reconnect: self
                .last_reconnect
                .filter(|raw| *raw != 0)
                .map(|raw| unit.normalize(raw)),
        }
    }
}

impl ClustersPayload {
    /// Convert into the snapshot the aggregators consume.
    ///
    /// `max_concurrency` overrides the payload value when set.
    pub fn into_snapshot(
        self,
        unit: TimestampUnit,
        taken_at: Timestamp,
        max_concurrency: Option<u32>,
    ) -> TelemetrySnapshot {
        let mut snapshot = TelemetrySnapshot::new(taken_at);
        snapshot.max_concurrency = max_concurrency.unwrap_or(self.max_concurrency);
        for cluster in self.clusters {
            let id = cluster.id;
            let shards = cluster.shards.map(|shards| {
                shards
                    .into_iter()
                    .map(|s| s.into_record(id, unit))
                    .collect()
            });
            if snapshot.clusters.insert(id, shards).is_some() {
                warn!(cluster_id = id, "Duplicate cluster in payload, keeping the last");
            }
        }
        snapshot
    }
}

/// Parse an RFC 3339 instant. The zero time and pre-epoch instants mean absent.
pub fn parse_instant(raw: &str) -> Result<Option<Timestamp>, AdapterError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let parsed = chrono::DateTime::parse_from_rfc3339(raw)
        .map_err(|e| AdapterError::Parse(format!("timestamp '{raw}': {e}")))?;
    Ok(u64::try_from(parsed.timestamp_millis())
        .ok()
        .filter(|ms| *ms > 0)
        .map(Timestamp::from_millis))
}

fn parse_optional_instant(raw: &Option<String>) -> Result<Option<Timestamp>, AdapterError> {
    match raw {
        Some(raw) => parse_instant(raw),
        None => Ok(None),
    }
}

/// One update of [`IncidentPayload`].
#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePayload {
    pub id: String,

    pub text: String,

    #[serde(default)]
    pub status: Option<String>,

    pub timestamp: String,
}

/// `GET /api/v1/incidents/{id}` response.
#[derive(Debug, Clone, Deserialize)]
pub struct IncidentPayload {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    pub impact: String,

    pub status: String,

    pub timestamp: String,

    #[serde(default)]
    pub last_update: Option<String>,

    #[serde(default)]
    pub resolution_timestamp: Option<String>,

    #[serde(default)]
    pub updates: Vec<UpdatePayload>,
}

fn parse_status(label: &str) -> Result<IncidentStatus, AdapterError> {
    IncidentStatus::from_label(label)
        .ok_or_else(|| AdapterError::Parse(format!("unknown incident status '{label}'")))
}

impl UpdatePayload {
    pub fn into_update(self) -> Result<IncidentUpdate, AdapterError> {
        let id = UpdateId::parse(&self.id).map_err(|e| AdapterError::Parse(e.to_string()))?;
        let status = self.status.as_deref().map(parse_status).transpose()?;
        let timestamp = parse_instant(&self.timestamp)?.unwrap_or(Timestamp::NEVER);
        Ok(IncidentUpdate {
            id,
            text: self.text,
            status,
            timestamp,
        })
    }
}

impl IncidentPayload {
    /// Convert into an incident. Unknown labels are parse errors.
    ///
    /// `last_update` and the resolution time are taken from the update list.
    /// The result must pass the same checks as a restored timeline.
    pub fn into_incident(self) -> Result<Incident, AdapterError> {
        let id = IncidentId::parse(&self.id).map_err(|e| AdapterError::Parse(e.to_string()))?;
        let impact = Impact::from_label(&self.impact)
            .ok_or_else(|| AdapterError::Parse(format!("unknown impact '{}'", self.impact)))?;
        let status = parse_status(&self.status)?;
        let timestamp = parse_instant(&self.timestamp)?.unwrap_or(Timestamp::NEVER);

        let mut updates = self
            .updates
            .into_iter()
            .map(UpdatePayload::into_update)
            .collect::<Result<Vec<_>, _>>()?;
        updates.sort_by_key(|u| u.timestamp);

        // The newest update is authoritative for both derived instants.
        let newest = updates.last().map(|u| u.timestamp);
        let reported_last = parse_optional_instant(&self.last_update)?;
        let last_update = match (newest, reported_last) {
            (Some(newest), Some(reported)) if newest != reported => {
                warn!(
                    incident = %id,
                    %reported,
                    %newest,
                    "Upstream last_update disagrees with newest update, using the update"
                );
                newest
            }
            (Some(newest), _) => newest,
            (None, reported) => reported.unwrap_or(timestamp),
        };

        let reported_resolution = parse_optional_instant(&self.resolution_timestamp)?;
        let resolution_timestamp = if status.is_terminal() {
            match reported_resolution {
                Some(at) if at == last_update => {}
                Some(at) => warn!(
                    incident = %id,
                    reported = %at,
                    resolving = %last_update,
                    "Upstream resolution time disagrees with resolving update, using the update"
                ),
                None => {
                    warn!(incident = %id, "Resolved incident without resolution time, using last update")
                }
            }
            Some(last_update)
        } else {
            reported_resolution
        };

        let incident = Incident {
            id,
            name: self.name,
            description: self.description,
            impact,
            status,
            timestamp,
            last_update,
            resolution_timestamp,
            updates,
        };

        IncidentTimeline::restore(incident)
            .map(IncidentTimeline::into_incident)
            .map_err(|e| AdapterError::Parse(format!("inconsistent incident: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLUSTERS: &str = r#"{
        "avg_latency": 999.0,
        "max_concurrency": 16,
        "num_shards": 3,
        "shards_up": 3,
        "clusters": [
            {
                "id": 0,
                "avg_latency": 1.0,
                "shards_up": 2,
                "up": true,
                "status": "operational",
                "shards": [
                    {"shard_id": 1, "cluster_id": 0, "up": true, "status": "connected",
                     "latency": 42, "last_heartbeat": 1700000000, "last_connection": 1699990000},
                    {"shard_id": 0, "cluster_id": 0, "up": false, "status": "Connected",
                     "latency": -1, "last_heartbeat": 0, "last_connection": 1699990000}
                ]
            },
            {"cluster_id": 1, "shards": [
                {"shard_id": 2, "up": true, "status": "hibernating", "latency": 12}
            ]},
            {"id": 2}
        ]
    }"#;

    #[test]
    fn timestamp_units() {
        assert_eq!(
            TimestampUnit::Seconds.normalize(1_700_000_000),
            Timestamp::from_millis(1_700_000_000_000)
        );
        assert_eq!(
            TimestampUnit::Millis.normalize(1_700_000_000_000),
            Timestamp::from_millis(1_700_000_000_000)
        );
        assert!(TimestampUnit::Seconds.normalize(0).is_never());
        assert_eq!(TimestampUnit::default(), TimestampUnit::Millis);
    }

    #[test]
    fn clusters_payload_normalizes() {
        let payload: ClustersPayload = serde_json::from_str(CLUSTERS).unwrap();
        let snapshot =
            payload.into_snapshot(TimestampUnit::Seconds, Timestamp::from_millis(5), None);

        assert_eq!(snapshot.max_concurrency, 16);
        assert_eq!(snapshot.clusters.len(), 3);
        assert!(snapshot.clusters[&2].is_none());

        let shards = snapshot.clusters[&0].as_ref().unwrap();
        let healthy = shards.iter().find(|s| s.shard_id == 1).unwrap();
        assert_eq!(healthy.status, ShardStatus::Connected);
        assert_eq!(healthy.last_heartbeat, Timestamp::from_secs(1_700_000_000));
        assert_eq!(healthy.latency, 42);

        let coerced = shards.iter().find(|s| s.shard_id == 0).unwrap();
        assert_eq!(coerced.status, ShardStatus::Disconnected);
        assert!(coerced.is_consistent());
        assert!(coerced.last_heartbeat.is_never());
        assert_eq!(coerced.latency, 0);

        let odd = &snapshot.clusters[&1].as_ref().unwrap()[0];
        assert_eq!(odd.status, ShardStatus::Unknown);
        assert_eq!(odd.cluster_id, 1);
    }

    #[test]
    fn concurrency_override() {
        let payload: ClustersPayload = serde_json::from_str(CLUSTERS).unwrap();
        let snapshot = payload.into_snapshot(TimestampUnit::Millis, Timestamp::NEVER, Some(4));
        assert_eq!(snapshot.max_concurrency, 4);
    }

    #[test]
    fn rfc3339_parsing() {
        assert_eq!(
            parse_instant("2024-01-01T00:00:00Z").unwrap(),
            Some(Timestamp::from_secs(1_704_067_200))
        );
        assert_eq!(
            parse_instant("2024-01-01T01:00:00.250+01:00").unwrap(),
            Some(Timestamp::from_millis(1_704_067_200_250))
        );
        assert_eq!(parse_instant("0001-01-01T00:00:00Z").unwrap(), None);
        assert_eq!(parse_instant("").unwrap(), None);
        assert!(matches!(
            parse_instant("yesterday"),
            Err(AdapterError::Parse(_))
        ));
    }

    #[test]
    fn incident_payload_converts() {
        let json = r#"{
            "id": "Ab3dEf9h",
            "name": "Gateway outage",
            "description": "Cluster 3 cannot identify",
            "impact": "major",
            "status": "resolved",
            "timestamp": "2024-01-01T00:00:00Z",
            "last_update": "2024-01-01T02:00:00Z",
            "resolution_timestamp": "0001-01-01T00:00:00Z",
            "updates": [
                {"id": "upd00002", "text": "fixed", "status": "resolved",
                 "timestamp": "2024-01-01T02:00:00Z"},
                {"id": "upd00001", "text": "looking", "timestamp": "2024-01-01T00:00:00Z"}
            ]
        }"#;
        let payload: IncidentPayload = serde_json::from_str(json).unwrap();
        let incident = payload.into_incident().unwrap();

        assert_eq!(incident.id.as_str(), "Ab3dEf9h");
        assert_eq!(incident.impact, Impact::Major);
        assert_eq!(incident.status, IncidentStatus::Resolved);
        assert_eq!(incident.updates.len(), 2);
        assert_eq!(incident.updates[0].id.as_str(), "upd00001");
        assert_eq!(incident.updates[1].status, Some(IncidentStatus::Resolved));
        assert_eq!(incident.last_update, Timestamp::from_secs(1_704_074_400));
        assert_eq!(incident.resolution_timestamp, Some(incident.last_update));
    }

    fn incident_json(status: &str, timestamp: &str, last: &str, resolved: &str, updates: &str) -> IncidentPayload {
        let json = format!(
            r#"{{"id": "Ab3dEf9h", "name": "Latency", "impact": "minor", "status": "{status}",
                "timestamp": "{timestamp}", "last_update": "{last}",
                "resolution_timestamp": "{resolved}", "updates": [{updates}]}}"#
        );
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn incident_last_update_follows_newest_update() {
        let payload = incident_json(
            "monitoring",
            "2024-01-01T00:00:00Z",
            "2024-01-09T00:00:00Z",
            "",
            r#"{"id": "upd00001", "text": "looking", "timestamp": "2024-01-02T00:00:00Z"}"#,
        );
        let incident = payload.into_incident().unwrap();
        assert_eq!(incident.last_update, incident.updates[0].timestamp);
        assert_eq!(incident.last_update, Timestamp::from_secs(1_704_153_600));
    }

    #[test]
    fn incident_resolution_follows_resolving_update() {
        let payload = incident_json(
            "resolved",
            "2024-01-01T00:00:00Z",
            "2024-01-03T00:00:00Z",
            "2023-12-31T00:00:00Z",
            r#"{"id": "upd00001", "text": "looking", "timestamp": "2024-01-02T00:00:00Z"},
               {"id": "upd00002", "text": "fixed", "status": "resolved",
                "timestamp": "2024-01-03T00:00:00Z"}"#,
        );
        let incident = payload.into_incident().unwrap();
        assert_eq!(incident.resolution_timestamp, Some(Timestamp::from_secs(1_704_240_000)));
        assert!(incident.resolution_timestamp >= Some(incident.timestamp));
    }

    #[test]
    fn incident_created_after_its_updates_is_rejected() {
        let payload = incident_json(
            "resolved",
            "2024-01-05T00:00:00Z",
            "2024-01-09T00:00:00Z",
            "2024-01-01T00:00:00Z",
            r#"{"id": "upd00001", "text": "looking", "timestamp": "2024-01-02T00:00:00Z"}"#,
        );
        assert!(matches!(payload.into_incident(), Err(AdapterError::Parse(_))));
    }

    #[test]
    fn incident_without_updates_is_rejected() {
        let payload = incident_json("monitoring", "2024-01-01T00:00:00Z", "", "", "");
        assert!(matches!(payload.into_incident(), Err(AdapterError::Parse(_))));
    }

    #[test]
    fn incident_payload_rejects_unknown_labels() {
        let json = r#"{"id": "Ab3dEf9h", "name": "x", "impact": "apocalyptic",
                       "status": "investigating", "timestamp": "2024-01-01T00:00:00Z"}"#;
        let payload: IncidentPayload = serde_json::from_str(json).unwrap();
        assert!(matches!(payload.into_incident(), Err(AdapterError::Parse(_))));

        let json = r#"{"id": "short", "name": "x", "impact": "none",
                       "status": "investigating", "timestamp": "2024-01-01T00:00:00Z"}"#;
        let payload: IncidentPayload = serde_json::from_str(json).unwrap();
        assert!(matches!(payload.into_incident(), Err(AdapterError::Parse(_))));
    }
}
