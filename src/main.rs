use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use shardwatch::server::{self, AppState};
use shardwatch::{logging, FileSource, HttpSource, IncidentStore, Settings, TelemetrySource};
use shardwatch_adapters::gateway::GatewayClient;
use shardwatch_core::{aggregate_snapshot, shard_index, summarize, IncidentBook};
use shardwatch_types::{IncidentId, Timestamp};

/// How often the refresh task checks the upstream poller for new results.
const UPSTREAM_TICK: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(name = "shardwatch")]
#[command(about = "Status service for sharded gateways")]
struct Args {
    /// Path to a TOML settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the status API (default)
    Serve(ServeArgs),

    /// Print the shard that handles a guild
    Shard {
        guild_id: String,

        /// Total number of shards
        #[arg(short, long)]
        shards: u32,
    },

    /// Aggregate a telemetry file and print the fleet rollup and status
    Summary {
        /// Telemetry JSON file (clusters payload)
        #[arg(short, long)]
        telemetry: PathBuf,

        /// Incident JSON file to take active incidents from
        #[arg(short, long)]
        incidents: Option<PathBuf>,
    },

    /// Fetch one incident from the upstream gateway API
    Incident {
        id: String,

        /// Upstream base URL (defaults to the configured one)
        #[arg(short, long)]
        upstream: Option<String>,
    },
}

#[derive(clap::Args, Debug, Default)]
struct ServeArgs {
    /// Address to listen on (host:port)
    #[arg(short, long)]
    bind: Option<String>,

    /// Read telemetry from a local file instead of the upstream
    #[arg(short, long, conflicts_with = "upstream")]
    telemetry: Option<PathBuf>,

    /// Poll telemetry from this gateway API
    #[arg(short, long)]
    upstream: Option<String>,

    /// Incident file to load from and save to
    #[arg(short, long)]
    incidents: Option<PathBuf>,

    /// Enable the incident admin routes
    #[arg(long)]
    admin: bool,

    /// Refresh interval in seconds
    #[arg(short, long)]
    refresh: Option<u64>,
}

impl ServeArgs {
    fn apply(self, settings: &mut Settings) {
        if let Some(bind) = self.bind {
            settings.bind_addr = bind;
        }
        if let Some(path) = self.telemetry {
            settings.telemetry_file = Some(path);
        }
        if let Some(url) = self.upstream {
            settings.upstream.base_url = Some(url);
            settings.telemetry_file = None;
        }
        if let Some(path) = self.incidents {
            settings.incidents_path = Some(path);
        }
        if self.admin {
            settings.admin_enabled = true;
        }
        if let Some(secs) = self.refresh {
            settings.refresh_secs = secs;
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref())
        .with_context(|| "failed to load settings")?;
    if let Some(level) = args.log_level {
        settings.log_level = level;
    }
    logging::init(&settings.log_level);

    match args.command.unwrap_or(Command::Serve(ServeArgs::default())) {
        Command::Serve(serve_args) => {
            serve_args.apply(&mut settings);
            run_server(settings)
        }
        Command::Shard { guild_id, shards } => {
            println!("{}", shard_index(&guild_id, shards)?);
            Ok(())
        }
        Command::Summary {
            telemetry,
            incidents,
        } => print_summary(&settings, &telemetry, incidents.as_deref()),
        Command::Incident { id, upstream } => {
            if let Some(url) = upstream {
                settings.upstream.base_url = Some(url);
            }
            fetch_incident(&settings, &id)
        }
    }
}

fn gateway_client(settings: &Settings) -> Result<GatewayClient> {
    let Some(base_url) = settings.upstream.base_url.as_deref() else {
        bail!("no upstream configured (set upstream.base_url or pass --upstream)");
    };
    Ok(GatewayClient::builder()
        .base_url(base_url)
        .timeout(settings.upstream_timeout())
        .timestamp_unit(settings.upstream.timestamp_unit)
        .max_concurrency(settings.max_concurrency)
        .build()?)
}

/// Pick the telemetry source and refresh tick: a local file wins over the upstream.
fn telemetry_source(settings: &Settings) -> Result<Option<(Box<dyn TelemetrySource>, Duration)>> {
    if let Some(path) = &settings.telemetry_file {
        let source = FileSource::new(path, settings.upstream.timestamp_unit)
            .with_max_concurrency(settings.max_concurrency);
        return Ok(Some((Box::new(source), settings.refresh_interval())));
    }

    if settings.upstream.base_url.is_some() {
        let (source, _handle) =
            HttpSource::spawn(gateway_client(settings)?, settings.refresh_interval());
        return Ok(Some((Box::new(source), UPSTREAM_TICK)));
    }

    Ok(None)
}

fn load_book(settings: &Settings) -> Result<Arc<IncidentBook>> {
    let book = match &settings.incidents_path {
        Some(path) => IncidentStore::new(path).load()?,
        None => IncidentBook::new(),
    };
    Ok(Arc::new(book))
}

/// Run the API until interrupted.
fn run_server(settings: Settings) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        let book = load_book(&settings)?;
        let state = AppState::new(book.clone(), settings.admin_enabled);

        if let Some(path) = &settings.incidents_path {
            IncidentStore::new(path).spawn_writer(book.clone());
        }

        match telemetry_source(&settings)? {
            Some((source, tick)) => {
                server::spawn_refresh(source, state.clone(), tick);
            }
            None => warn!("No telemetry source configured; fleet endpoints will report 503"),
        }

        let listener = server::bind(&settings.bind_addr)
            .await
            .with_context(|| format!("failed to bind {}", settings.bind_addr))?;

        tokio::select! {
            result = server::serve(listener, state) => result?,
            _ = tokio::signal::ctrl_c() => info!("Shutting down"),
        }
        Ok::<(), anyhow::Error>(())
    })
}

/// Aggregate a telemetry file once and print the result as JSON.
fn print_summary(settings: &Settings, telemetry: &Path, incidents: Option<&Path>) -> Result<()> {
    let mut source = FileSource::new(telemetry, settings.upstream.timestamp_unit)
        .with_max_concurrency(settings.max_concurrency);
    let Some(snapshot) = source.read() else {
        bail!(
            "failed to read {}: {}",
            telemetry.display(),
            source.error().unwrap_or("no data")
        );
    };

    let book = match incidents {
        Some(path) => IncidentStore::new(path).load()?,
        None => IncidentBook::new(),
    };

    let fleet = aggregate_snapshot(&snapshot);
    let active = book.active();
    let status = summarize(&fleet, &active, Timestamp::now());

    let mut report = serde_json::Map::new();
    report.insert("fleet".to_string(), serde_json::to_value(&fleet)?);
    report.insert("status".to_string(), serde_json::to_value(&status)?);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn fetch_incident(settings: &Settings, raw_id: &str) -> Result<()> {
    let id = IncidentId::parse(raw_id)?;
    let client = gateway_client(settings)?;

    let rt = tokio::runtime::Runtime::new()?;
    let incident = rt.block_on(client.fetch_incident(&id))?;
    println!("{}", serde_json::to_string_pretty(&incident)?);
    Ok(())
}
