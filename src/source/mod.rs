//! Telemetry source abstraction.
//!
//! A source hands out raw [`TelemetrySnapshot`]s; the refresh task in
//! [`crate::server`] aggregates whatever the source produced last.

mod channel;
mod file;
mod http;

pub use channel::ChannelSource;
pub use file::FileSource;
pub use http::HttpSource;

use std::fmt::Debug;

use shardwatch_types::TelemetrySnapshot;

/// Trait for receiving shard telemetry from various sources.
///
/// # Example
///
/// ```
/// use shardwatch::{FileSource, TelemetrySource};
/// use shardwatch_adapters::TimestampUnit;
///
/// let mut source = FileSource::new("clusters.json", TimestampUnit::Millis);
/// if let Some(snapshot) = source.poll() {
///     println!("Got {} shards", snapshot.num_shards());
/// }
/// ```
pub trait TelemetrySource: Send + Debug {
    /// Poll for the latest snapshot.
    ///
    /// Returns `Some(snapshot)` if new data is available, `None` otherwise.
    /// This method should be non-blocking.
    fn poll(&mut self) -> Option<TelemetrySnapshot>;

    /// Returns a human-readable description of the source.
    fn description(&self) -> &str;

    /// The error from the last poll, if it failed.
    fn error(&self) -> Option<&str>;
}
