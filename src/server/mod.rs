//! HTTP API and telemetry refresh.
//!
//! The server keeps the latest fleet rollup in an `Arc<RwLock<Option<_>>>`
//! shared with the refresh task, and the incident book behind an `Arc`.
//! Every request is buffered and handed to [`routes::route`].

pub mod routes;

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::RwLock;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use shardwatch_core::{aggregate_snapshot, IncidentBook};
use shardwatch_types::{FleetWrapper, Timestamp};

use crate::source::TelemetrySource;
pub use routes::{route, ApiRequest, ApiResponse};

/// Largest request body the API buffers.
pub const MAX_BODY_BYTES: usize = 8 * 1024;

/// State shared by request handlers and the refresh task.
#[derive(Debug, Clone)]
pub struct AppState {
    fleet: Arc<RwLock<Option<FleetWrapper>>>,
    source_error: Arc<RwLock<Option<String>>>,
    book: Arc<IncidentBook>,
    admin_enabled: bool,
}

impl AppState {
    pub fn new(book: Arc<IncidentBook>, admin_enabled: bool) -> Self {
        Self {
            fleet: Arc::new(RwLock::new(None)),
            source_error: Arc::new(RwLock::new(None)),
            book,
            admin_enabled,
        }
    }

    pub fn book(&self) -> &IncidentBook {
        &self.book
    }

    pub fn admin_enabled(&self) -> bool {
        self.admin_enabled
    }

    /// Replace the current fleet rollup.
    pub fn record(&self, fleet: FleetWrapper) {
        *self.fleet.write() = Some(fleet);
    }

    /// The latest fleet rollup, if any telemetry has arrived.
    pub fn latest_fleet(&self) -> Option<FleetWrapper> {
        self.fleet.read().clone()
    }

    /// Remember why the telemetry source last failed, or clear it.
    pub fn set_source_error(&self, error: Option<String>) {
        *self.source_error.write() = error;
    }

    pub fn source_error(&self) -> Option<String> {
        self.source_error.read().clone()
    }

    /// Get a handle to the fleet storage.
    pub fn fleet_storage(&self) -> Arc<RwLock<Option<FleetWrapper>>> {
        self.fleet.clone()
    }
}

/// Poll the source once and store a fresh rollup if it produced one.
///
/// Returns whether the stored fleet changed.
pub fn refresh_once(source: &mut dyn TelemetrySource, state: &AppState) -> bool {
    let Some(snapshot) = source.poll() else {
        return false;
    };
    let fleet = aggregate_snapshot(&snapshot);
    debug!(
        source = source.description(),
        shards = fleet.num_shards,
        shards_up = fleet.shards_up,
        "Refreshed fleet"
    );
    state.record(fleet);
    true
}

/// Spawn the task that re-aggregates telemetry every `tick`.
///
/// Source errors are logged once per distinct message; the previous
/// rollup stays in place until the source recovers.
pub fn spawn_refresh(
    mut source: Box<dyn TelemetrySource>,
    state: AppState,
    tick: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(source = source.description(), "Starting telemetry refresh");
        let mut interval = tokio::time::interval(tick);
        let mut last_error: Option<String> = None;

        loop {
            interval.tick().await;
            if refresh_once(source.as_mut(), &state) {
                if last_error.take().is_some() {
                    info!(source = source.description(), "Telemetry source recovered");
                    state.set_source_error(None);
                }
                continue;
            }
            match source.error() {
                Some(err) if last_error.as_deref() != Some(err) => {
                    warn!(source = source.description(), error = err, "Telemetry source failed");
                    last_error = Some(err.to_string());
                    state.set_source_error(last_error.clone());
                }
                _ => {}
            }
        }
    })
}

/// Bind the API listener.
pub async fn bind(addr: &str) -> std::io::Result<TcpListener> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    TcpListener::bind(addr).await
}

/// Accept connections forever, serving the JSON API.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, admin = state.admin_enabled(), "Serving status API");
    }

    loop {
        let (stream, peer) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let state = state.clone();
                async move { handle_request(req, &state).await }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!(%peer, error = %e, "Connection error");
            }
        });
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();

    let response = match Limited::new(body, MAX_BODY_BYTES).collect().await {
        Ok(collected) => {
            let request = ApiRequest {
                method: parts.method,
                path: parts.uri.path().to_string(),
                query: parts.uri.query().map(str::to_string),
                body: collected.to_bytes().to_vec(),
            };
            route(state, &request, Timestamp::now())
        }
        Err(e) if e.is::<LengthLimitError>() => ApiResponse::error(
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("body exceeds {MAX_BODY_BYTES} bytes"),
        ),
        Err(e) => ApiResponse::error(StatusCode::BAD_REQUEST, format!("unreadable body: {e}")),
    };

    Ok(into_response(response))
}

fn into_response(api: ApiResponse) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(api.body)));
    *response.status_mut() = api.status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(api.content_type));
    response
}
