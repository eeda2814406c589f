//! Channel-based telemetry source.
//!
//! Receives snapshots pushed through a tokio watch channel, for producers
//! that already hold telemetry in memory (an embedded gateway, tests).

use tokio::sync::watch;

use shardwatch_types::TelemetrySnapshot;

use super::TelemetrySource;

/// A source that receives telemetry snapshots via a channel.
///
/// Only values sent after creation are returned; the placeholder the
/// channel starts with is never reported as telemetry.
///
/// # Example
///
/// ```
/// use shardwatch::{ChannelSource, TelemetrySource};
/// use shardwatch_types::TelemetrySnapshot;
///
/// let (tx, mut source) = ChannelSource::create("embedded");
/// assert!(source.poll().is_none());
///
/// tx.send(TelemetrySnapshot::default()).unwrap();
/// assert!(source.poll().is_some());
/// ```
#[derive(Debug)]
pub struct ChannelSource {
    receiver: watch::Receiver<TelemetrySnapshot>,
    description: String,
    closed: bool,
}

impl ChannelSource {
    /// Create a new channel source.
    ///
    /// # Arguments
    ///
    /// * `receiver` - The receiving end of a watch channel
    /// * `source_description` - A description of where snapshots come from
    pub fn new(receiver: watch::Receiver<TelemetrySnapshot>, source_description: &str) -> Self {
        let description = format!("channel: {}", source_description);
        Self {
            receiver,
            description,
            closed: false,
        }
    }

    /// Create a channel pair for sending snapshots to a ChannelSource.
    pub fn create(source_description: &str) -> (watch::Sender<TelemetrySnapshot>, Self) {
        let (tx, rx) = watch::channel(TelemetrySnapshot::default());
        (tx, Self::new(rx, source_description))
    }
}

impl TelemetrySource for ChannelSource {
    fn poll(&mut self) -> Option<TelemetrySnapshot> {
        match self.receiver.has_changed() {
            Ok(true) => Some(self.receiver.borrow_and_update().clone()),
            Ok(false) => None,
            Err(_) => {
                self.closed = true;
                None
            }
        }
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<&str> {
        self.closed.then_some("sender dropped")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardwatch_types::Timestamp;

    #[test]
    fn test_channel_source_poll() {
        let (tx, mut source) = ChannelSource::create("test");

        // The placeholder is not telemetry
        assert!(source.poll().is_none());

        let snapshot = TelemetrySnapshot::builder()
            .taken_at(Timestamp::from_secs(1))
            .cluster(0, |c| c.shard(0, |s| s.connected()))
            .build();
        tx.send(snapshot.clone()).unwrap();

        assert_eq!(source.poll(), Some(snapshot));
        assert!(source.poll().is_none());
        assert_eq!(source.description(), "channel: test");
    }

    #[test]
    fn test_channel_source_reports_closed_sender() {
        let (tx, mut source) = ChannelSource::create("test");
        drop(tx);
        assert!(source.poll().is_none());
        assert_eq!(source.error(), Some("sender dropped"));
    }
}
