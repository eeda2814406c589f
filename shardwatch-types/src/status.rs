//! The fleet-wide status line.

use alloc::collections::BTreeSet;
use core::fmt;

use crate::{Impact, IncidentId, Timestamp};

/// Single label combining incident impact and shard health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FleetStatus {
    #[default]
    Operational,
    Degraded,
    MajorOutage,
}

impl FleetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FleetStatus::Operational => "operational",
            FleetStatus::Degraded => "degraded",
            FleetStatus::MajorOutage => "major_outage",
        }
    }
}

impl fmt::Display for FleetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The externally visible rollup. Recomputed on demand, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatusSummary {
    pub status: FleetStatus,

    /// Worst impact among active incidents.
    pub impact: Impact,

    /// Ids of incidents that are not resolved.
    pub active_incidents: BTreeSet<IncidentId>,

    /// Instant of computation.
    pub timestamp: Timestamp,
}

impl StatusSummary {
    pub fn is_operational(&self) -> bool {
        self.status == FleetStatus::Operational
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_reflects_severity() {
        assert!(FleetStatus::Operational < FleetStatus::Degraded);
        assert!(FleetStatus::Degraded < FleetStatus::MajorOutage);
    }

    #[test]
    fn default_summary_is_operational() {
        let summary = StatusSummary::default();
        assert!(summary.is_operational());
        assert_eq!(summary.impact, Impact::None);
        assert!(summary.active_incidents.is_empty());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn major_outage_label() {
        let json = serde_json::to_string(&FleetStatus::MajorOutage).unwrap();
        assert_eq!(json, "\"major_outage\"");
        assert_eq!(FleetStatus::MajorOutage.to_string(), "major_outage");
    }
}
