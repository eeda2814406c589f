//! Incidents and their timestamped updates.
//!
//! The types here are plain data. Lifecycle rules (which transitions are
//! legal, chronological ordering of updates) live in `shardwatch-core`.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::Timestamp;

/// Minimum length of incident and update identifiers.
pub const ID_MIN_LEN: usize = 8;

/// Error returned when a string is not a valid short identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError(pub String);

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid id '{}': expected at least {} ASCII letters or digits",
            self.0, ID_MIN_LEN
        )
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParseIdError {}

fn is_valid_id(s: &str) -> bool {
    s.len() >= ID_MIN_LEN && s.bytes().all(|b| b.is_ascii_alphanumeric())
}

macro_rules! short_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap an identifier.
            pub fn parse(s: &str) -> Result<Self, ParseIdError> {
                if is_valid_id(s) {
                    Ok(Self(String::from(s)))
                } else {
                    Err(ParseIdError(String::from(s)))
                }
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ParseIdError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                if is_valid_id(&s) {
                    Ok(Self(s))
                } else {
                    Err(ParseIdError(s))
                }
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

short_id!(
    /// Opaque short identifier of an incident.
    IncidentId
);

short_id!(
    /// Opaque short identifier of an incident update.
    UpdateId
);

/// Ordinal severity of an incident. `none < minor < major < critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Impact {
    #[default]
    None,
    Minor,
    Major,
    Critical,
}

impl Impact {
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "none" => Some(Impact::None),
            "minor" => Some(Impact::Minor),
            "major" => Some(Impact::Major),
            "critical" => Some(Impact::Critical),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::None => "none",
            Impact::Minor => "minor",
            Impact::Major => "major",
            Impact::Critical => "critical",
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum IncidentStatus {
    #[default]
    Investigating,
    Identified,
    Monitoring,
    Resolved,
    /// Planned work, announced ahead of time.
    Maintenance,
}

impl IncidentStatus {
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "investigating" => Some(IncidentStatus::Investigating),
            "identified" => Some(IncidentStatus::Identified),
            "monitoring" => Some(IncidentStatus::Monitoring),
            "resolved" => Some(IncidentStatus::Resolved),
            "maintenance" => Some(IncidentStatus::Maintenance),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Investigating => "investigating",
            IncidentStatus::Identified => "identified",
            IncidentStatus::Monitoring => "monitoring",
            IncidentStatus::Resolved => "resolved",
            IncidentStatus::Maintenance => "maintenance",
        }
    }

    /// Resolved incidents accept no further changes.
    pub fn is_terminal(&self) -> bool {
        matches!(self, IncidentStatus::Resolved)
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single operator note on an incident.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IncidentUpdate {
    pub id: UpdateId,

    pub text: String,

    /// State transition carried by this update, if any.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub status: Option<IncidentStatus>,

    pub timestamp: Timestamp,
}

impl IncidentUpdate {
    /// Create an update without a state transition.
    pub fn new(id: UpdateId, text: impl Into<String>, timestamp: impl Into<Timestamp>) -> Self {
        Self {
            id,
            text: text.into(),
            status: None,
            timestamp: timestamp.into(),
        }
    }

    /// Attach a state transition to this update.
    pub fn with_status(mut self, status: IncidentStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// A tracked service-health event.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Incident {
    pub id: IncidentId,

    pub name: String,

    #[cfg_attr(feature = "serde", serde(default))]
    pub description: String,

    pub impact: Impact,

    pub status: IncidentStatus,

    /// Creation instant.
    pub timestamp: Timestamp,

    /// Instant of the most recent update.
    pub last_update: Timestamp,

    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub resolution_timestamp: Option<Timestamp>,

    /// Chronological, append-only.
    pub updates: Vec<IncidentUpdate>,
}

impl Incident {
    /// Whether the incident is still ongoing.
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// The most recent update.
    pub fn latest_update(&self) -> Option<&IncidentUpdate> {
        self.updates.last()
    }

    /// Find an update by id.
    pub fn update(&self, id: &UpdateId) -> Option<&IncidentUpdate> {
        self.updates.iter().find(|u| &u.id == id)
    }
}

/// Operator-supplied fields of a new incident.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IncidentDetails {
    pub name: String,

    #[cfg_attr(feature = "serde", serde(default))]
    pub description: String,

    #[cfg_attr(feature = "serde", serde(default))]
    pub impact: Impact,
}

impl IncidentDetails {
    pub fn new(name: impl Into<String>, impact: Impact) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            impact,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Partial edit of an open incident's descriptive fields.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IncidentPatch {
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: Option<String>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub description: Option<String>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub impact: Option<Impact>,
}

impl IncidentPatch {
    /// A patch with no fields set changes nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.impact.is_none()
    }
}

/// A set of incidents keyed by id, as served to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IncidentList {
    /// When the list was generated.
    pub timestamp: Timestamp,

    pub incidents: BTreeMap<IncidentId, Incident>,
}

impl IncidentList {
    pub fn new(timestamp: Timestamp, incidents: impl IntoIterator<Item = Incident>) -> Self {
        Self {
            timestamp,
            incidents: incidents.into_iter().map(|i| (i.id.clone(), i)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.incidents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_validation() {
        assert!(IncidentId::parse("aB3dE5gH").is_ok());
        assert!(IncidentId::parse("aB3dE5gH12").is_ok());
        assert!(IncidentId::parse("asdf").is_err());
        assert!(IncidentId::parse("asdf-asdf").is_err());
        assert!(UpdateId::parse("").is_err());
    }

    #[test]
    fn id_error_mentions_input() {
        let err = IncidentId::parse("bad").unwrap_err();
        assert!(err.to_string().contains("'bad'"));
    }

    #[test]
    fn impact_is_totally_ordered() {
        assert!(Impact::None < Impact::Minor);
        assert!(Impact::Minor < Impact::Major);
        assert!(Impact::Major < Impact::Critical);
        assert_eq!(
            [Impact::Minor, Impact::Critical, Impact::None]
                .into_iter()
                .max(),
            Some(Impact::Critical)
        );
    }

    #[test]
    fn labels_roundtrip() {
        for impact in [Impact::None, Impact::Minor, Impact::Major, Impact::Critical] {
            assert_eq!(Impact::from_label(impact.as_str()), Some(impact));
        }
        for status in [
            IncidentStatus::Investigating,
            IncidentStatus::Identified,
            IncidentStatus::Monitoring,
            IncidentStatus::Resolved,
            IncidentStatus::Maintenance,
        ] {
            assert_eq!(IncidentStatus::from_label(status.as_str()), Some(status));
        }
        assert_eq!(Impact::from_label("catastrophic"), None);
    }

    #[test]
    fn only_resolved_is_terminal() {
        assert!(IncidentStatus::Resolved.is_terminal());
        assert!(!IncidentStatus::Monitoring.is_terminal());
        assert!(!IncidentStatus::Maintenance.is_terminal());
    }

    #[test]
    fn patch_emptiness() {
        assert!(IncidentPatch::default().is_empty());
        let patch = IncidentPatch {
            impact: Some(Impact::Major),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn id_deserialization_validates() {
        let ok: Result<IncidentId, _> = serde_json::from_str("\"abcdEFGH\"");
        assert!(ok.is_ok());
        let bad: Result<IncidentId, _> = serde_json::from_str("\"abc\"");
        assert!(bad.is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn update_status_is_optional_on_the_wire() {
        let json = r#"{"id":"upd00001","text":"looking into it","timestamp":1000}"#;
        let update: IncidentUpdate = serde_json::from_str(json).unwrap();
        assert!(update.status.is_none());

        let json = serde_json::to_string(&update.with_status(IncidentStatus::Identified)).unwrap();
        assert!(json.contains("\"status\":\"identified\""));
    }
}
