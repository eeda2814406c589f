//! The incident lifecycle state machine.
//!
//! Incidents move along `investigating -> identified -> monitoring ->
//! resolved`, skipping forward is allowed. Planned maintenance opens in
//! `maintenance` and can only move to `resolved`. A resolved incident is
//! frozen.
//!
//! Every command validates fully before touching the incident, so a
//! rejected command leaves it unchanged.

use shardwatch_types::{
    Incident, IncidentDetails, IncidentId, IncidentPatch, IncidentStatus, IncidentUpdate,
    NAME_MAX_LEN, TEXT_MAX_LEN,
};

use crate::{Error, Result};

/// Position on the forward chain, `None` for the maintenance branch.
fn chain_rank(status: IncidentStatus) -> Option<u8> {
    match status {
        IncidentStatus::Investigating => Some(0),
        IncidentStatus::Identified => Some(1),
        IncidentStatus::Monitoring => Some(2),
        IncidentStatus::Resolved => Some(3),
        IncidentStatus::Maintenance => None,
    }
}

/// Whether an incident in `from` may move to `to`.
///
/// Staying put is allowed for every non-terminal state.
pub fn transition_allowed(from: IncidentStatus, to: IncidentStatus) -> bool {
    if from.is_terminal() {
        return false;
    }
    if from == to {
        return true;
    }
    match (chain_rank(from), chain_rank(to)) {
        (Some(a), Some(b)) => b > a,
        (None, _) => to == IncidentStatus::Resolved,
        (Some(_), None) => false,
    }
}

fn check_len(field: &'static str, value: &str, min: usize, max: usize) -> Result<()> {
    if min > 0 && value.trim().is_empty() {
        return Err(Error::Invalid {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    let len = value.chars().count();
    if len < min || len > max {
        return Err(Error::Invalid {
            field,
            reason: format!("length {len} outside {min}..={max}"),
        });
    }
    Ok(())
}

fn check_name(name: &str) -> Result<()> {
    check_len("name", name, 1, NAME_MAX_LEN)
}

fn check_description(description: &str) -> Result<()> {
    check_len("description", description, 0, TEXT_MAX_LEN)
}

fn check_text(text: &str) -> Result<()> {
    check_len("text", text, 1, TEXT_MAX_LEN)
}

/// An incident together with the rules that govern its changes.
#[derive(Debug, Clone, PartialEq)]
pub struct IncidentTimeline {
    incident: Incident,
}

impl IncidentTimeline {
    /// Open an incident under investigation.
    pub fn open(id: IncidentId, details: IncidentDetails, opening: IncidentUpdate) -> Result<Self> {
        Self::open_as(id, details, opening, IncidentStatus::Investigating)
    }

    /// Open a planned maintenance window.
    pub fn open_maintenance(
        id: IncidentId,
        details: IncidentDetails,
        opening: IncidentUpdate,
    ) -> Result<Self> {
        Self::open_as(id, details, opening, IncidentStatus::Maintenance)
    }

    fn open_as(
        id: IncidentId,
        details: IncidentDetails,
        mut opening: IncidentUpdate,
        status: IncidentStatus,
    ) -> Result<Self> {
        check_name(&details.name)?;
        check_description(&details.description)?;
        check_text(&opening.text)?;
        match opening.status {
            Some(s) if s != status => {
                return Err(Error::InvalidTransition { from: status, to: s });
            }
            _ => opening.status = Some(status),
        }

        let timestamp = opening.timestamp;
        Ok(Self {
            incident: Incident {
                id,
                name: details.name,
                description: details.description,
                impact: details.impact,
                status,
                timestamp,
                last_update: timestamp,
                resolution_timestamp: None,
                updates: vec![opening],
            },
        })
    }

    /// Rebuild a timeline from a stored incident, checking its invariants.
    pub fn restore(incident: Incident) -> Result<Self> {
        check_name(&incident.name)?;
        check_description(&incident.description)?;

        let Some(last) = incident.updates.last() else {
            return Err(Error::Invalid {
                field: "updates",
                reason: "incident has no updates".to_string(),
            });
        };
        if last.timestamp != incident.last_update {
            return Err(Error::Invalid {
                field: "last_update",
                reason: format!(
                    "{} does not match latest update at {}",
                    incident.last_update, last.timestamp
                ),
            });
        }
        for pair in incident.updates.windows(2) {
            if pair[1].timestamp < pair[0].timestamp {
                return Err(Error::OutOfOrderUpdate {
                    update: pair[1].timestamp,
                    last_update: pair[0].timestamp,
                });
            }
        }
        let first = &incident.updates[0];
        if incident.timestamp > first.timestamp {
            return Err(Error::Invalid {
                field: "timestamp",
                reason: format!(
                    "created at {} after its first update at {}",
                    incident.timestamp, first.timestamp
                ),
            });
        }
        for update in &incident.updates {
            check_text(&update.text)?;
        }

        // Resolution closes the timeline, so the resolving update is the last one.
        let resolving = incident.updates.len() - 1;
        if let Some(pos) = incident
            .updates
            .iter()
            .position(|u| u.status.is_some_and(|s| s.is_terminal()))
        {
            if pos != resolving {
                return Err(Error::Invalid {
                    field: "updates",
                    reason: format!("update {} follows the resolution", incident.updates[pos + 1].id),
                });
            }
        }
        match (incident.status.is_terminal(), incident.resolution_timestamp) {
            (true, Some(at)) if at == last.timestamp => {}
            (false, None) => {}
            (true, Some(at)) => {
                return Err(Error::Invalid {
                    field: "resolution_timestamp",
                    reason: format!(
                        "{} does not match the resolving update at {}",
                        at, last.timestamp
                    ),
                });
            }
            _ => {
                return Err(Error::Invalid {
                    field: "resolution_timestamp",
                    reason: format!(
                        "must be set exactly when resolved (status {})",
                        incident.status
                    ),
                });
            }
        }

        Ok(Self { incident })
    }

    /// Append an operator update, applying its status annotation.
    pub fn append(&mut self, update: IncidentUpdate) -> Result<()> {
        let current = self.incident.status;
        if current.is_terminal() {
            return Err(Error::IncidentClosed(self.incident.id.clone()));
        }
        check_text(&update.text)?;
        if self.incident.update(&update.id).is_some() {
            return Err(Error::Invalid {
                field: "update id",
                reason: format!("{} already exists", update.id),
            });
        }
        if update.timestamp < self.incident.last_update {
            return Err(Error::OutOfOrderUpdate {
                update: update.timestamp,
                last_update: self.incident.last_update,
            });
        }
        if let Some(next) = update.status {
            if !transition_allowed(current, next) {
                return Err(Error::InvalidTransition {
                    from: current,
                    to: next,
                });
            }
        }

        let timestamp = update.timestamp;
        if let Some(next) = update.status {
            self.incident.status = next;
            if next.is_terminal() {
                self.incident.resolution_timestamp = Some(timestamp);
            }
        }
        self.incident.last_update = timestamp;
        self.incident.updates.push(update);
        Ok(())
    }

    /// Append a final update and resolve the incident.
    pub fn resolve(&mut self, update: IncidentUpdate) -> Result<()> {
        self.append(update.with_status(IncidentStatus::Resolved))
    }

    /// Edit the descriptive fields of an open incident.
    ///
    /// Amendments are not updates, so `last_update` is left alone.
    pub fn amend(&mut self, patch: IncidentPatch) -> Result<()> {
        if self.incident.status.is_terminal() {
            return Err(Error::IncidentClosed(self.incident.id.clone()));
        }
        if let Some(name) = &patch.name {
            check_name(name)?;
        }
        if let Some(description) = &patch.description {
            check_description(description)?;
        }

        if let Some(name) = patch.name {
            self.incident.name = name;
        }
        if let Some(description) = patch.description {
            self.incident.description = description;
        }
        if let Some(impact) = patch.impact {
            self.incident.impact = impact;
        }
        Ok(())
    }

    pub fn id(&self) -> &IncidentId {
        &self.incident.id
    }

    pub fn status(&self) -> IncidentStatus {
        self.incident.status
    }

    pub fn incident(&self) -> &Incident {
        &self.incident
    }

    pub fn into_incident(self) -> Incident {
        self.incident
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardwatch_types::{Impact, Timestamp, UpdateId};

    fn id(s: &str) -> IncidentId {
        IncidentId::parse(s).unwrap()
    }

    fn update(n: u32, ts: u64) -> IncidentUpdate {
        let uid = UpdateId::parse(&format!("update{n:03}")).unwrap();
        IncidentUpdate::new(uid, format!("note {n}"), Timestamp::from_millis(ts))
    }

    fn opened() -> IncidentTimeline {
        IncidentTimeline::open(
            id("inc00001"),
            IncidentDetails::new("Shards reconnecting", Impact::Minor),
            update(0, 1_000),
        )
        .unwrap()
    }

    // ========================================================================
    // Transition table
    // ========================================================================

    #[test]
    fn forward_chain_is_allowed() {
        use IncidentStatus::*;
        assert!(transition_allowed(Investigating, Identified));
        assert!(transition_allowed(Identified, Monitoring));
        assert!(transition_allowed(Monitoring, Resolved));
        assert!(transition_allowed(Investigating, Resolved));
        assert!(transition_allowed(Monitoring, Monitoring));
        assert!(transition_allowed(Maintenance, Maintenance));
        assert!(transition_allowed(Maintenance, Resolved));
    }

    #[test]
    fn backward_and_cross_branch_are_rejected() {
        use IncidentStatus::*;
        assert!(!transition_allowed(Monitoring, Investigating));
        assert!(!transition_allowed(Identified, Investigating));
        assert!(!transition_allowed(Investigating, Maintenance));
        assert!(!transition_allowed(Maintenance, Identified));
        assert!(!transition_allowed(Resolved, Resolved));
        assert!(!transition_allowed(Resolved, Investigating));
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    #[test]
    fn open_starts_investigating() {
        let t = opened();
        let inc = t.incident();
        assert_eq!(inc.status, IncidentStatus::Investigating);
        assert_eq!(inc.updates.len(), 1);
        assert_eq!(inc.updates[0].status, Some(IncidentStatus::Investigating));
        assert_eq!(inc.timestamp, Timestamp::from_millis(1_000));
        assert_eq!(inc.last_update, inc.timestamp);
        assert!(inc.resolution_timestamp.is_none());
    }

    #[test]
    fn open_maintenance_uses_side_branch() {
        let mut t = IncidentTimeline::open_maintenance(
            id("maint001"),
            IncidentDetails::new("Database upgrade", Impact::None),
            update(0, 10),
        )
        .unwrap();
        assert_eq!(t.status(), IncidentStatus::Maintenance);
        let err = t
            .append(update(1, 20).with_status(IncidentStatus::Monitoring))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        t.resolve(update(2, 30)).unwrap();
        assert_eq!(t.status(), IncidentStatus::Resolved);
    }

    #[test]
    fn full_lifecycle() {
        let mut t = opened();
        t.append(update(1, 2_000).with_status(IncidentStatus::Identified))
            .unwrap();
        t.append(update(2, 3_000)).unwrap();
        t.resolve(update(3, 4_000)).unwrap();

        let inc = t.incident();
        assert_eq!(inc.status, IncidentStatus::Resolved);
        assert_eq!(inc.updates.len(), 4);
        assert_eq!(inc.resolution_timestamp, Some(Timestamp::from_millis(4_000)));
        assert_eq!(inc.last_update, Timestamp::from_millis(4_000));
        assert!(inc
            .updates
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn open_then_two_updates_then_resolve_has_three_updates() {
        let mut t = opened();
        t.append(update(1, 2_000)).unwrap();
        t.resolve(update(2, 3_000)).unwrap();
        let inc = t.into_incident();
        assert_eq!(inc.updates.len(), 3);
        assert_eq!(inc.resolution_timestamp, Some(Timestamp::from_millis(3_000)));
    }

    #[test]
    fn out_of_order_update_leaves_incident_unchanged() {
        let mut t = opened();
        t.append(update(1, 5_000)).unwrap();
        let before = t.clone();

        let err = t.append(update(2, 4_999)).unwrap_err();
        assert_eq!(
            err,
            Error::OutOfOrderUpdate {
                update: Timestamp::from_millis(4_999),
                last_update: Timestamp::from_millis(5_000),
            }
        );
        assert_eq!(t, before);
    }

    #[test]
    fn equal_timestamps_are_accepted() {
        let mut t = opened();
        t.append(update(1, 1_000)).unwrap();
        assert_eq!(t.incident().updates.len(), 2);
    }

    #[test]
    fn resolved_incident_is_closed() {
        let mut t = opened();
        t.resolve(update(1, 2_000)).unwrap();
        let before = t.clone();

        assert!(matches!(
            t.append(update(2, 3_000)),
            Err(Error::IncidentClosed(_))
        ));
        assert!(matches!(
            t.resolve(update(3, 3_000)),
            Err(Error::IncidentClosed(_))
        ));
        let patch = IncidentPatch {
            name: Some("renamed".into()),
            ..Default::default()
        };
        assert!(matches!(t.amend(patch), Err(Error::IncidentClosed(_))));
        assert_eq!(t, before);
    }

    #[test]
    fn backward_move_is_invalid() {
        let mut t = opened();
        t.append(update(1, 2_000).with_status(IncidentStatus::Monitoring))
            .unwrap();
        let err = t
            .append(update(2, 3_000).with_status(IncidentStatus::Identified))
            .unwrap_err();
        assert_eq!(
            err,
            Error::InvalidTransition {
                from: IncidentStatus::Monitoring,
                to: IncidentStatus::Identified,
            }
        );
        assert_eq!(t.incident().updates.len(), 2);
    }

    #[test]
    fn duplicate_update_id_is_rejected() {
        let mut t = opened();
        let err = t.append(update(0, 2_000)).unwrap_err();
        assert!(matches!(err, Error::Invalid { field: "update id", .. }));
    }

    // ========================================================================
    // Validation and amend
    // ========================================================================

    #[test]
    fn field_lengths_are_validated() {
        let long_name = "x".repeat(NAME_MAX_LEN + 1);
        let err = IncidentTimeline::open(
            id("inc00002"),
            IncidentDetails::new(long_name, Impact::Minor),
            update(0, 1),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Invalid { field: "name", .. }));

        let err = IncidentTimeline::open(
            id("inc00002"),
            IncidentDetails::new("   ", Impact::Minor),
            update(0, 1),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Invalid { field: "name", .. }));

        let mut t = opened();
        let mut blank = update(1, 2_000);
        blank.text = String::new();
        assert!(matches!(
            t.append(blank),
            Err(Error::Invalid { field: "text", .. })
        ));
    }

    #[test]
    fn opening_with_foreign_status_is_rejected() {
        let err = IncidentTimeline::open(
            id("inc00003"),
            IncidentDetails::new("Outage", Impact::Major),
            update(0, 1).with_status(IncidentStatus::Resolved),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
    }

    #[test]
    fn amend_keeps_last_update() {
        let mut t = opened();
        t.amend(IncidentPatch {
            impact: Some(Impact::Critical),
            description: Some("All shards in cluster 3".into()),
            ..Default::default()
        })
        .unwrap();
        let inc = t.incident();
        assert_eq!(inc.impact, Impact::Critical);
        assert_eq!(inc.description, "All shards in cluster 3");
        assert_eq!(inc.name, "Shards reconnecting");
        assert_eq!(inc.last_update, Timestamp::from_millis(1_000));
    }

    // ========================================================================
    // Restore
    // ========================================================================

    #[test]
    fn restore_accepts_own_output() {
        let mut t = opened();
        t.resolve(update(1, 2_000)).unwrap();
        let restored = IncidentTimeline::restore(t.incident().clone()).unwrap();
        assert_eq!(restored, t);
    }

    #[test]
    fn restore_rejects_broken_invariants() {
        let good = opened().into_incident();

        let mut empty = good.clone();
        empty.updates.clear();
        assert!(IncidentTimeline::restore(empty).is_err());

        let mut stale = good.clone();
        stale.last_update = Timestamp::from_millis(1);
        assert!(IncidentTimeline::restore(stale).is_err());

        let mut resolved_without_stamp = good.clone();
        resolved_without_stamp.status = IncidentStatus::Resolved;
        assert!(IncidentTimeline::restore(resolved_without_stamp).is_err());

        let mut shuffled = good;
        shuffled.updates.insert(0, update(9, 5_000));
        assert!(matches!(
            IncidentTimeline::restore(shuffled),
            Err(Error::OutOfOrderUpdate { .. })
        ));
    }

    #[test]
    fn restore_pins_resolution_to_the_resolving_update() {
        let mut t = opened();
        t.append(update(1, 2_000)).unwrap();
        t.resolve(update(2, 3_000)).unwrap();
        let good = t.into_incident();

        let mut early = good.clone();
        early.resolution_timestamp = Some(Timestamp::from_millis(500));
        assert!(matches!(
            IncidentTimeline::restore(early),
            Err(Error::Invalid { field: "resolution_timestamp", .. })
        ));

        let mut drifted = good.clone();
        drifted.resolution_timestamp = Some(Timestamp::from_millis(2_000));
        assert!(IncidentTimeline::restore(drifted).is_err());

        // An update after the resolving one
        let mut reopened = good.clone();
        let mut extra = update(3, 3_000);
        reopened.updates[1].status = Some(IncidentStatus::Resolved);
        extra.status = None;
        reopened.updates[2] = extra;
        assert!(matches!(
            IncidentTimeline::restore(reopened),
            Err(Error::Invalid { field: "updates", .. })
        ));

        assert!(IncidentTimeline::restore(good).is_ok());
    }

    #[test]
    fn restore_rejects_creation_after_first_update() {
        let mut incident = opened().into_incident();
        incident.timestamp = Timestamp::from_millis(1_500);
        assert!(matches!(
            IncidentTimeline::restore(incident),
            Err(Error::Invalid { field: "timestamp", .. })
        ));
    }
}
