//! Upstream telemetry source.
//!
//! A background task polls the gateway API on an interval and publishes
//! each outcome through a watch channel; `poll` never blocks.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use shardwatch_adapters::gateway::GatewayClient;
use shardwatch_types::TelemetrySnapshot;

use super::TelemetrySource;

type Outcome = Option<Result<TelemetrySnapshot, String>>;

/// A source fed by periodic `GET /api/v1/clusters` calls.
#[derive(Debug)]
pub struct HttpSource {
    receiver: watch::Receiver<Outcome>,
    description: String,
    last_error: Option<String>,
}

impl HttpSource {
    /// Spawn the polling task. Must be called inside a tokio runtime.
    ///
    /// Failed fetches are logged and reported through [`TelemetrySource::error`];
    /// the next attempt waits for the next tick.
    pub fn spawn(client: GatewayClient, interval: Duration) -> (Self, JoinHandle<()>) {
        let (tx, rx) = watch::channel(None);
        let description = format!("upstream: {}", client.base_url());

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let outcome = match client.fetch_snapshot().await {
                    Ok(snapshot) => {
                        debug!(shards = snapshot.num_shards(), "Fetched upstream telemetry");
                        Ok(snapshot)
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to fetch upstream telemetry");
                        Err(e.to_string())
                    }
                };
                if tx.send(Some(outcome)).is_err() {
                    break;
                }
            }
        });

        let source = Self {
            receiver: rx,
            description,
            last_error: None,
        };
        (source, handle)
    }
}

impl TelemetrySource for HttpSource {
    fn poll(&mut self) -> Option<TelemetrySnapshot> {
        if !self.receiver.has_changed().unwrap_or(false) {
            return None;
        }
        match &*self.receiver.borrow_and_update() {
            Some(Ok(snapshot)) => {
                self.last_error = None;
                Some(snapshot.clone())
            }
            Some(Err(e)) => {
                self.last_error = Some(e.clone());
                None
            }
            None => None,
        }
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
