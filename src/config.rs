//! Service configuration.
//!
//! Settings come from built-in defaults, an optional TOML file and then
//! `SHARDWATCH_*` environment variables, later sources winning. Nested keys
//! use a double underscore, e.g. `SHARDWATCH_UPSTREAM__BASE_URL`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use shardwatch_adapters::TimestampUnit;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "SHARDWATCH";

/// Upstream gateway API settings.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamSettings {
    /// Base URL of the gateway status API; no polling when unset.
    pub base_url: Option<String>,

    pub timeout_secs: u64,

    /// Unit of the epoch integers in shard telemetry.
    pub timestamp_unit: TimestampUnit,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub bind_addr: String,

    pub log_level: String,

    /// How often telemetry is re-read and re-aggregated.
    pub refresh_secs: u64,

    /// Expose the incident command routes.
    pub admin_enabled: bool,

    /// JSON file incidents are loaded from and saved to.
    pub incidents_path: Option<PathBuf>,

    /// Local telemetry file, used instead of the upstream when set.
    pub telemetry_file: Option<PathBuf>,

    /// Overrides the start concurrency reported by the gateway.
    pub max_concurrency: Option<u32>,

    pub upstream: UpstreamSettings,
}

impl Settings {
    /// Load settings from an optional file and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, environment())
    }

    /// Load settings with an explicit environment source.
    pub fn load_with(path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("bind_addr", "0.0.0.0:8080")?
            .set_default("log_level", "info")?
            .set_default("refresh_secs", 10)?
            .set_default("admin_enabled", false)?
            .set_default("upstream.timeout_secs", 10)?
            .set_default("upstream.timestamp_unit", "millis")?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        builder.add_source(env).build()?.try_deserialize()
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs.max(1))
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.timeout_secs)
    }
}

/// The `SHARDWATCH_*` environment source.
pub fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
