//! The in-memory incident authority.
//!
//! Commands on different incidents run in parallel; commands on the same
//! incident are serialized by that incident's mutex. The outer map lock is
//! held only long enough to look up, insert or remove an entry.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use shardwatch_types::{
    Incident, IncidentDetails, IncidentId, IncidentPatch, IncidentStatus, IncidentUpdate,
    Timestamp, UpdateId, ID_MIN_LEN,
};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::{Error, IncidentTimeline, Result};

/// Page size of [`IncidentBook::before`] listings.
pub const PAGE_SIZE: usize = 25;

const EVENT_CAPACITY: usize = 64;
const ID_ATTEMPTS: usize = 16;

/// A change applied to the book.
#[derive(Debug, Clone, PartialEq)]
pub enum IncidentEvent {
    Opened(Incident),
    /// An update was appended, possibly resolving the incident.
    Updated(Incident),
    Amended(Incident),
    Deleted(IncidentId),
}

impl IncidentEvent {
    pub fn incident_id(&self) -> &IncidentId {
        match self {
            IncidentEvent::Opened(i) | IncidentEvent::Updated(i) | IncidentEvent::Amended(i) => {
                &i.id
            }
            IncidentEvent::Deleted(id) => id,
        }
    }
}

type Entry = Arc<Mutex<IncidentTimeline>>;

/// Concurrent store of incident timelines.
#[derive(Debug)]
pub struct IncidentBook {
    incidents: RwLock<BTreeMap<IncidentId, Entry>>,
    events: broadcast::Sender<IncidentEvent>,
}

impl Default for IncidentBook {
    fn default() -> Self {
        Self::new()
    }
}

fn short_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(ID_MIN_LEN);
    id
}

impl IncidentBook {
    /// Create an empty book.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            incidents: RwLock::new(BTreeMap::new()),
            events,
        }
    }

    /// Rebuild a book from stored incidents, checking each one.
    pub fn from_incidents<I>(incidents: I) -> Result<Self>
    where
        I: IntoIterator<Item = Incident>,
    {
        let book = Self::new();
        {
            let mut map = book.incidents.write();
            for incident in incidents {
                let timeline = IncidentTimeline::restore(incident)?;
                map.insert(timeline.id().clone(), Arc::new(Mutex::new(timeline)));
            }
        }
        Ok(book)
    }

    /// Receive every change applied after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<IncidentEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: IncidentEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    fn entry(&self, id: &IncidentId) -> Result<Entry> {
        self.incidents
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.clone()))
    }

    fn new_update_id(&self) -> Result<UpdateId> {
        for _ in 0..ID_ATTEMPTS {
            let id = UpdateId::parse(&short_id())?;
            if self.find_update(&id).is_none() {
                return Ok(id);
            }
        }
        Err(Error::Invalid {
            field: "id",
            reason: "could not allocate a unique update id".to_string(),
        })
    }

    fn find_update(&self, id: &UpdateId) -> Option<(IncidentId, IncidentUpdate)> {
        let entries: Vec<Entry> = self.incidents.read().values().cloned().collect();
        entries.iter().find_map(|entry| {
            let timeline = entry.lock();
            timeline
                .incident()
                .update(id)
                .map(|u| (timeline.id().clone(), u.clone()))
        })
    }

    fn insert_new<F>(&self, build: F) -> Result<Incident>
    where
        F: Fn(IncidentId) -> Result<IncidentTimeline>,
    {
        for _ in 0..ID_ATTEMPTS {
            let id = IncidentId::parse(&short_id())?;
            let timeline = build(id.clone())?;
            let incident = timeline.incident().clone();

            let mut map = self.incidents.write();
            if map.contains_key(&id) {
                continue;
            }
            map.insert(id.clone(), Arc::new(Mutex::new(timeline)));
            self.emit(IncidentEvent::Opened(incident.clone()));
            drop(map);

            debug!(
                incident = %id,
                impact = %incident.impact,
                status = %incident.status,
                "Opened incident"
            );
            return Ok(incident);
        }
        Err(Error::Invalid {
            field: "id",
            reason: "could not allocate a unique incident id".to_string(),
        })
    }

    /// Open an incident under investigation with its first update.
    pub fn open(
        &self,
        details: IncidentDetails,
        text: impl Into<String>,
        at: Timestamp,
    ) -> Result<Incident> {
        let text = text.into();
        let update_id = self.new_update_id()?;
        self.insert_new(|id| {
            let opening = IncidentUpdate::new(update_id.clone(), text.clone(), at);
            IncidentTimeline::open(id, details.clone(), opening)
        })
    }

    /// Announce a maintenance window.
    pub fn open_maintenance(
        &self,
        details: IncidentDetails,
        text: impl Into<String>,
        at: Timestamp,
    ) -> Result<Incident> {
        let text = text.into();
        let update_id = self.new_update_id()?;
        self.insert_new(|id| {
            let opening = IncidentUpdate::new(update_id.clone(), text.clone(), at);
            IncidentTimeline::open_maintenance(id, details.clone(), opening)
        })
    }

    /// Run a command under the incident's lock. The event is sent before
    /// the lock is released so subscribers see per-incident order.
    fn apply<F>(
        &self,
        id: &IncidentId,
        command: F,
        event: fn(Incident) -> IncidentEvent,
    ) -> Result<Incident>
    where
        F: FnOnce(&mut IncidentTimeline) -> Result<()>,
    {
        let entry = self.entry(id)?;
        let mut timeline = entry.lock();
        command(&mut timeline)?;
        let incident = timeline.incident().clone();
        self.emit(event(incident.clone()));
        Ok(incident)
    }

    /// Append an update, optionally moving the incident to a new state.
    pub fn post_update(
        &self,
        id: &IncidentId,
        text: impl Into<String>,
        status: Option<IncidentStatus>,
        at: Timestamp,
    ) -> Result<Incident> {
        let mut update = IncidentUpdate::new(self.new_update_id()?, text, at);
        update.status = status;
        let incident = self.apply(id, |t| t.append(update), IncidentEvent::Updated)?;
        debug!(incident = %id, status = %incident.status, "Posted incident update");
        Ok(incident)
    }

    /// Append a final update and resolve.
    pub fn resolve(
        &self,
        id: &IncidentId,
        text: impl Into<String>,
        at: Timestamp,
    ) -> Result<Incident> {
        let update = IncidentUpdate::new(self.new_update_id()?, text, at);
        let incident = self.apply(id, |t| t.resolve(update), IncidentEvent::Updated)?;
        debug!(incident = %id, "Resolved incident");
        Ok(incident)
    }

    /// Edit name, description or impact of an open incident.
    pub fn amend(&self, id: &IncidentId, patch: IncidentPatch) -> Result<Incident> {
        let incident = self.apply(id, |t| t.amend(patch), IncidentEvent::Amended)?;
        debug!(incident = %id, "Amended incident");
        Ok(incident)
    }

    /// Remove an incident, returning its final state.
    pub fn delete(&self, id: &IncidentId) -> Result<Incident> {
        let entry = self
            .incidents
            .write()
            .remove(id)
            .ok_or_else(|| Error::NotFound(id.clone()))?;
        // Wait for any in-flight command on this incident.
        let timeline = entry.lock();
        self.emit(IncidentEvent::Deleted(id.clone()));
        debug!(incident = %id, "Deleted incident");
        Ok(timeline.incident().clone())
    }

    pub fn get(&self, id: &IncidentId) -> Result<Incident> {
        Ok(self.entry(id)?.lock().incident().clone())
    }

    /// Find an update and the incident it belongs to.
    pub fn update(&self, id: &UpdateId) -> Result<(IncidentId, IncidentUpdate)> {
        self.find_update(id)
            .ok_or_else(|| Error::UpdateNotFound(id.clone()))
    }

    fn listing<P>(&self, keep: P) -> Vec<Incident>
    where
        P: Fn(&Incident) -> bool,
    {
        let entries: Vec<Entry> = self.incidents.read().values().cloned().collect();
        let mut incidents: Vec<Incident> = entries
            .iter()
            .map(|e| e.lock().incident().clone())
            .filter(|i| keep(i))
            .collect();
        incidents.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
        incidents
    }

    /// Unresolved incidents, newest first.
    pub fn active(&self) -> Vec<Incident> {
        self.listing(Incident::is_active)
    }

    /// Up to `limit` incidents opened strictly before `instant`, newest first.
    pub fn before(&self, instant: Timestamp, limit: usize) -> Vec<Incident> {
        let mut incidents = self.listing(|i| i.timestamp < instant);
        incidents.truncate(limit);
        incidents
    }

    /// Every incident, newest first.
    pub fn all(&self) -> Vec<Incident> {
        self.listing(|_| true)
    }

    pub fn len(&self) -> usize {
        self.incidents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.incidents.read().is_empty()
    }
}
