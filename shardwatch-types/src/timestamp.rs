//! Instant representation for serialization.
//!
//! We use milliseconds since the Unix epoch as the canonical unit for
//! instants. Upstream payloads that report seconds are normalized at the
//! adapter boundary, never inside the core.

use core::fmt;
use core::time::Duration;

/// An instant in milliseconds since the Unix epoch.
///
/// The zero value doubles as the "never" sentinel used by gateways for
/// shards that have not produced a heartbeat yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// The epoch-zero sentinel.
    pub const NEVER: Timestamp = Timestamp(0);

    /// Create from milliseconds since the epoch.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Create from seconds since the epoch.
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1000))
    }

    /// The current wall-clock instant.
    #[cfg(feature = "std")]
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| Self(d.as_millis() as u64))
            .unwrap_or(Self::NEVER)
    }

    /// Get the value in milliseconds.
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Get the value in seconds (truncated).
    pub const fn as_secs(&self) -> u64 {
        self.0 / 1000
    }

    /// Whether this is the "never" sentinel.
    pub const fn is_never(&self) -> bool {
        self.0 == 0
    }

    /// Time elapsed between `self` and a later instant.
    ///
    /// Returns `None` for the sentinel. Instants after `now` yield zero.
    pub fn age(&self, now: Timestamp) -> Option<Duration> {
        if self.is_never() {
            return None;
        }
        Some(Duration::from_millis(now.0.saturating_sub(self.0)))
    }

    /// Shift this instant forward.
    pub fn after(&self, duration: Duration) -> Self {
        Self(self.0.saturating_add(duration.as_millis() as u64))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

impl From<u64> for Timestamp {
    fn from(millis: u64) -> Self {
        Self(millis)
    }
}
