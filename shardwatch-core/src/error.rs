//! Error types for aggregation and incident commands.

use shardwatch_types::{IncidentId, IncidentStatus, Timestamp, UpdateId};
use thiserror::Error;

/// Result alias for core operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by the core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// No incident with this id.
    #[error("incident {0} not found")]
    NotFound(IncidentId),

    /// No update with this id.
    #[error("update {0} not found")]
    UpdateNotFound(UpdateId),

    /// Malformed identifier.
    #[error("invalid id: {0}")]
    InvalidId(String),

    /// The requested state change is not a legal move.
    #[error("cannot move incident from {from} to {to}")]
    InvalidTransition {
        from: IncidentStatus,
        to: IncidentStatus,
    },

    /// The incident is resolved and accepts no further changes.
    #[error("incident {0} is resolved")]
    IncidentClosed(IncidentId),

    /// The update predates the incident's latest update.
    #[error("update at {update} precedes last update at {last_update}")]
    OutOfOrderUpdate {
        update: Timestamp,
        last_update: Timestamp,
    },

    /// Shard lookups need at least one shard.
    #[error("shards_total must be at least 1")]
    ZeroShards,

    /// The guild id is not a decimal number.
    #[error("invalid guild id '{0}'")]
    InvalidGuildId(String),

    /// A field failed validation.
    #[error("invalid {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

impl Error {
    /// Whether this error is a misuse of the incident state machine.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Error::InvalidTransition { .. }
                | Error::IncidentClosed(_)
                | Error::OutOfOrderUpdate { .. }
        )
    }

    /// Whether this error reports a missing incident or update.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::UpdateNotFound(_))
    }
}

impl From<shardwatch_types::ParseIdError> for Error {
    fn from(err: shardwatch_types::ParseIdError) -> Self {
        Error::InvalidId(err.0)
    }
}
