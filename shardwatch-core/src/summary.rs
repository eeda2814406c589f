//! Deriving the single status line shown at the top of the page.

use std::collections::BTreeSet;

use shardwatch_types::{FleetStatus, FleetWrapper, Impact, Incident, StatusSummary, Timestamp};

/// Combine fleet health with the active incidents.
///
/// Rules, first match wins:
/// 1. an active incident of major impact or worse is a major outage;
/// 2. a fleet with shards but none up is a major outage;
/// 3. a minor incident or any down shard is degraded;
/// 4. otherwise operational.
///
/// An empty fleet carries no health signal. `now` is the only clock input.
pub fn summarize<'a, I>(fleet: &FleetWrapper, incidents: I, now: Timestamp) -> StatusSummary
where
    I: IntoIterator<Item = &'a Incident>,
{
    let mut impact = Impact::None;
    let mut active_incidents = BTreeSet::new();
    for incident in incidents.into_iter().filter(|i| i.is_active()) {
        impact = impact.max(incident.impact);
        active_incidents.insert(incident.id.clone());
    }

    let status = if impact >= Impact::Major {
        FleetStatus::MajorOutage
    } else if !fleet.is_empty() && fleet.shards_up == 0 {
        FleetStatus::MajorOutage
    } else if impact == Impact::Minor || fleet.shards_down() > 0 {
        FleetStatus::Degraded
    } else {
        FleetStatus::Operational
    };

    StatusSummary {
        status,
        impact,
        active_incidents,
        timestamp: now,
    }
}
