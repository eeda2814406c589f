//! Per-shard health records.

use core::fmt;
use core::time::Duration;

use crate::Timestamp;

/// Connection state reported by a gateway shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ShardStatus {
    /// Session established and heartbeating.
    Connected,
    /// Resuming a dropped session.
    Resuming,
    /// Opening a fresh session.
    Connecting,
    /// No session.
    Disconnected,
    /// The gateway reported a state this version does not know.
    #[default]
    Unknown,
}

impl ShardStatus {
    /// Parse a gateway state label. Matching is case-insensitive.
    pub fn from_label(label: &str) -> Option<Self> {
        const LABELS: &[(&str, ShardStatus)] = &[
            ("connected", ShardStatus::Connected),
            ("resuming", ShardStatus::Resuming),
            ("connecting", ShardStatus::Connecting),
            ("disconnected", ShardStatus::Disconnected),
            ("unknown", ShardStatus::Unknown),
        ];
        LABELS
            .iter()
            .find(|(l, _)| l.eq_ignore_ascii_case(label.trim()))
            .map(|(_, s)| *s)
    }

    /// The wire label for this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShardStatus::Connected => "connected",
            ShardStatus::Resuming => "resuming",
            ShardStatus::Connecting => "connecting",
            ShardStatus::Disconnected => "disconnected",
            ShardStatus::Unknown => "unknown",
        }
    }

    /// Only a connected shard counts as healthy.
    pub fn is_healthy(&self) -> bool {
        matches!(self, ShardStatus::Connected)
    }
}

impl fmt::Display for ShardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized health snapshot for one gateway shard.
///
/// Records are produced by the gateway processes; this crate only reads them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShardRecord {
    /// Shard index, stable for the lifetime of the shard.
    pub shard_id: u32,

    /// The cluster process that owns this shard.
    pub cluster_id: u32,

    /// Whether the shard currently holds a live session.
    pub up: bool,

    pub status: ShardStatus,

    /// Gateway round-trip latency in milliseconds.
    pub latency: u32,

    /// Last heartbeat acknowledgement, [`Timestamp::NEVER`] if none yet.
    pub last_heartbeat: Timestamp,

    pub last_connection: Timestamp,

    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub last_reconnect: Option<Timestamp>,
}

impl ShardRecord {
    /// Create a builder for a shard record.
    pub fn builder(shard_id: u32) -> ShardRecordBuilder {
        ShardRecordBuilder::new(shard_id)
    }

    /// Time since the last heartbeat, `None` if the shard never heartbeated.
    pub fn heartbeat_age(&self, now: Timestamp) -> Option<Duration> {
        self.last_heartbeat.age(now)
    }

    /// A down shard must not carry a healthy label.
    pub fn is_consistent(&self) -> bool {
        self.up || !self.status.is_healthy()
    }
}

/// Builder for `ShardRecord`.
#[derive(Debug, Default)]
pub struct ShardRecordBuilder {
    record: ShardRecord,
}

impl ShardRecordBuilder {
    /// Create a new builder. The shard starts down and disconnected.
    pub fn new(shard_id: u32) -> Self {
        Self {
            record: ShardRecord {
                shard_id,
                status: ShardStatus::Disconnected,
                ..Default::default()
            },
        }
    }

    /// Set the owning cluster.
    pub fn cluster(mut self, cluster_id: u32) -> Self {
        self.record.cluster_id = cluster_id;
        self
    }

    /// Mark the shard as up and connected.
    pub fn connected(mut self) -> Self {
        self.record.up = true;
        self.record.status = ShardStatus::Connected;
        self
    }

    /// Set the up flag and status explicitly.
    pub fn state(mut self, up: bool, status: ShardStatus) -> Self {
        self.record.up = up;
        self.record.status = status;
        self
    }

    /// Set the latency in milliseconds.
    pub fn latency(mut self, latency: u32) -> Self {
        self.record.latency = latency;
        self
    }

    /// Set the last heartbeat instant.
    pub fn last_heartbeat(mut self, at: impl Into<Timestamp>) -> Self {
        self.record.last_heartbeat = at.into();
        self
    }

    /// Set the last connection instant.
    pub fn last_connection(mut self, at: impl Into<Timestamp>) -> Self {
        self.record.last_connection = at.into();
        self
    }

    /// Set the last reconnect instant.
    pub fn last_reconnect(mut self, at: impl Into<Timestamp>) -> Self {
        self.record.last_reconnect = Some(at.into());
        self
    }

    /// Build the record.
    pub fn build(self) -> ShardRecord {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_labels_parse_case_insensitively() {
        assert_eq!(
            ShardStatus::from_label("Connected"),
            Some(ShardStatus::Connected)
        );
        assert_eq!(
            ShardStatus::from_label(" resuming "),
            Some(ShardStatus::Resuming)
        );
        assert_eq!(ShardStatus::from_label("zombie"), None);
    }

    #[test]
    fn status_label_roundtrip() {
        for status in [
            ShardStatus::Connected,
            ShardStatus::Resuming,
            ShardStatus::Connecting,
            ShardStatus::Disconnected,
            ShardStatus::Unknown,
        ] {
            assert_eq!(ShardStatus::from_label(status.as_str()), Some(status));
        }
    }

    #[test]
    fn builder_defaults_to_down() {
        let shard = ShardRecord::builder(3).build();
        assert_eq!(shard.shard_id, 3);
        assert!(!shard.up);
        assert_eq!(shard.status, ShardStatus::Disconnected);
        assert!(shard.last_heartbeat.is_never());
        assert!(shard.last_reconnect.is_none());
    }

    #[test]
    fn builder_all_fields() {
        let shard = ShardRecord::builder(7)
            .cluster(2)
            .connected()
            .latency(41)
            .last_heartbeat(Timestamp::from_secs(100))
            .last_connection(Timestamp::from_secs(50))
            .last_reconnect(Timestamp::from_secs(60))
            .build();

        assert_eq!(shard.cluster_id, 2);
        assert!(shard.up);
        assert_eq!(shard.latency, 41);
        assert_eq!(shard.last_reconnect, Some(Timestamp::from_secs(60)));
    }

    #[test]
    fn heartbeat_age_handles_never() {
        let now = Timestamp::from_secs(100);
        let fresh = ShardRecord::builder(0)
            .last_heartbeat(Timestamp::from_secs(95))
            .build();
        assert_eq!(fresh.heartbeat_age(now), Some(Duration::from_secs(5)));

        let never = ShardRecord::builder(1).build();
        assert_eq!(never.heartbeat_age(now), None);
    }

    #[test]
    fn consistency_rejects_down_and_connected() {
        let bad = ShardRecord::builder(0)
            .state(false, ShardStatus::Connected)
            .build();
        assert!(!bad.is_consistent());

        let resuming = ShardRecord::builder(0)
            .state(false, ShardStatus::Resuming)
            .build();
        assert!(resuming.is_consistent());
    }
}
