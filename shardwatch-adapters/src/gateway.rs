//! HTTP client for the gateway's status API.
//!
//! ## Example
//!
//! ```rust,no_run
//! use shardwatch_adapters::gateway::GatewayClient;
//! use shardwatch_adapters::TimestampUnit;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = GatewayClient::builder()
//!         .base_url("http://gateway.internal:8080")
//!         .timestamp_unit(TimestampUnit::Seconds)
//!         .build()?;
//!
//!     let snapshot = client.fetch_snapshot().await?;
//!     println!("{} shards reported", snapshot.num_shards());
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use shardwatch_types::{Incident, IncidentId, TelemetrySnapshot, Timestamp};

use crate::wire::{ClustersPayload, IncidentPayload, TimestampUnit};
use crate::AdapterError;

const DEFAULT_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for `GET /api/v1/clusters` and `GET /api/v1/incidents/{id}`.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
    timestamp_unit: TimestampUnit,
    max_concurrency: Option<u32>,
}

impl GatewayClient {
    /// Create a new builder for configuring the client.
    pub fn builder() -> GatewayClientBuilder {
        GatewayClientBuilder::default()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, AdapterError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "Fetching from upstream");

        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(AdapterError::NotFound(path.to_string()));
        }

        if !response.status().is_success() {
            return Err(AdapterError::Http(format!(
                "API returned status {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))
    }

    /// Fetch shard telemetry and normalize it into a snapshot.
    pub async fn fetch_snapshot(&self) -> Result<TelemetrySnapshot, AdapterError> {
        let payload: ClustersPayload = self.get_json("/api/v1/clusters").await?;
        Ok(payload.into_snapshot(self.timestamp_unit, Timestamp::now(), self.max_concurrency))
    }

    /// Fetch a single incident.
    pub async fn fetch_incident(&self, id: &IncidentId) -> Result<Incident, AdapterError> {
        let payload: IncidentPayload = self
            .get_json(&format!("/api/v1/incidents/{id}"))
            .await
            .map_err(|e| match e {
                AdapterError::NotFound(_) => AdapterError::NotFound(format!("incident {id}")),
                other => other,
            })?;
        payload.into_incident()
    }
}

/// Builder for GatewayClient.
#[derive(Debug, Default)]
pub struct GatewayClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    timestamp_unit: Option<TimestampUnit>,
    max_concurrency: Option<u32>,
}

impl GatewayClientBuilder {
    /// Set the API base URL (e.g., "http://localhost:8080").
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the unit of shard timestamps (default: milliseconds).
    pub fn timestamp_unit(mut self, unit: TimestampUnit) -> Self {
        self.timestamp_unit = Some(unit);
        self
    }

    /// Override the start concurrency reported by the gateway.
    pub fn max_concurrency(mut self, max_concurrency: Option<u32>) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<GatewayClient, AdapterError> {
        let client = Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(GatewayClient {
            client,
            base_url,
            timestamp_unit: self.timestamp_unit.unwrap_or_default(),
            max_concurrency: self.max_concurrency,
        })
    }
}
