//! Request routing for the JSON API.
//!
//! Routing is a plain function from a buffered request to a buffered
//! response so it can be exercised without a socket.

use hyper::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use shardwatch_core::{shard_index, summarize, Error, PAGE_SIZE};
use shardwatch_types::{
    Impact, IncidentDetails, IncidentId, IncidentList, IncidentPatch, IncidentStatus,
    IncidentUpdate, Timestamp, UpdateId,
};

use super::AppState;

/// A buffered request.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub body: Vec<u8>,
}

impl ApiRequest {
    pub fn get(path_and_query: &str) -> Self {
        Self::new(Method::GET, path_and_query, Vec::new())
    }

    pub fn new(method: Method, path_and_query: &str, body: impl Into<Vec<u8>>) -> Self {
        let (path, query) = match path_and_query.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (path_and_query.to_string(), None),
        };
        Self {
            method,
            path,
            query,
            body: body.into(),
        }
    }

    /// Decoded value of a query parameter.
    fn param(&self, name: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        let url = reqwest::Url::parse(&format!("http://localhost/?{query}")).ok()?;
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }
}

/// A buffered response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: String,
}

impl ApiResponse {
    fn json<T: Serialize>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self {
                status,
                content_type: "application/json",
                body,
            },
            Err(e) => Self::error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }

    fn ok<T: Serialize>(value: &T) -> Self {
        Self::json(StatusCode::OK, value)
    }

    fn text(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: body.to_string(),
        }
    }

    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self::json(
            status,
            &ErrorBody {
                error: message.into(),
            },
        )
    }

    fn not_found() -> Self {
        Self::error(StatusCode::NOT_FOUND, "not found")
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// HTTP status for a core error.
pub fn error_status(err: &Error) -> StatusCode {
    match err {
        _ if err.is_not_found() => StatusCode::NOT_FOUND,
        _ if err.is_conflict() => StatusCode::CONFLICT,
        Error::Invalid { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::BAD_REQUEST,
    }
}

impl From<Error> for ApiResponse {
    fn from(err: Error) -> Self {
        let status = error_status(&err);
        if status == StatusCode::CONFLICT {
            warn!(error = %err, "Rejected incident command");
        }
        ApiResponse::error(status, err.to_string())
    }
}

/// Body of `POST /api/v1/admin/incidents`.
#[derive(Debug, Deserialize)]
struct OpenIncident {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    impact: Impact,
    /// Text of the first update.
    text: String,
    #[serde(default)]
    maintenance: bool,
}

/// Body of `POST /api/v1/admin/incidents/{id}/update`.
#[derive(Debug, Deserialize)]
struct PostUpdate {
    text: String,
    #[serde(default)]
    status: Option<IncidentStatus>,
}

/// Body of `POST /api/v1/admin/incidents/{id}/resolve`.
#[derive(Debug, Deserialize)]
struct Resolve {
    text: String,
}

#[derive(Debug, Serialize)]
struct UpdateView<'a> {
    incident_id: &'a IncidentId,
    #[serde(flatten)]
    update: &'a IncidentUpdate,
}

#[derive(Debug, Serialize)]
struct ShardView {
    guild_id: String,
    shards_total: u32,
    /// `-1` for an empty guild id.
    shard_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    cluster_id: Option<u32>,
}

fn parse_body<'a, T: Deserialize<'a>>(body: &'a [u8]) -> Result<T, ApiResponse> {
    serde_json::from_slice(body)
        .map_err(|e| ApiResponse::error(StatusCode::BAD_REQUEST, format!("invalid body: {e}")))
}

fn parse_incident_id(raw: &str) -> Result<IncidentId, ApiResponse> {
    IncidentId::parse(raw).map_err(|e| ApiResponse::error(StatusCode::BAD_REQUEST, e.to_string()))
}

fn parse_before(raw: &str) -> Result<Timestamp, ApiResponse> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .ok()
        .and_then(|t| u64::try_from(t.timestamp_millis()).ok())
        .map(Timestamp::from_millis)
        .ok_or_else(|| {
            ApiResponse::error(
                StatusCode::BAD_REQUEST,
                format!("invalid 'before' timestamp '{raw}'"),
            )
        })
}

/// Route a request against the shared state.
///
/// `now` stamps summaries, listings and incident commands.
pub fn route(state: &AppState, req: &ApiRequest, now: Timestamp) -> ApiResponse {
    let segments: Vec<&str> = req
        .path
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    debug!(method = %req.method, path = %req.path, "Handling request");

    let result = match (&req.method, segments.as_slice()) {
        (&Method::GET, ["health"]) => Ok(ApiResponse::text(StatusCode::OK, "OK")),
        (&Method::GET, ["api", "v1", "status"]) => status(state, now),
        (&Method::GET, ["api", "v1", "clusters"]) => clusters(state),
        (&Method::GET, ["api", "v1", "incidents"]) => incidents(state, req, now),
        (&Method::GET, ["api", "v1", "incidents", "active"]) => Ok(ApiResponse::ok(
            &IncidentList::new(now, state.book().active()),
        )),
        (&Method::GET, ["api", "v1", "incidents", id]) => incident(state, id),
        (&Method::GET, ["api", "v1", "updates", id]) => update(state, id),
        (&Method::GET, ["api", "v1", "shard"]) => shard(state, req),
        (_, ["api", "v1", "admin", rest @ ..]) if state.admin_enabled() => {
            admin(state, &req.method, rest, &req.body, now)
        }
        _ => Ok(ApiResponse::not_found()),
    };

    result.unwrap_or_else(|response| response)
}

fn status(state: &AppState, now: Timestamp) -> Result<ApiResponse, ApiResponse> {
    let fleet = state.latest_fleet().ok_or_else(|| no_telemetry(state))?;
    let incidents = state.book().active();
    Ok(ApiResponse::ok(&summarize(&fleet, &incidents, now)))
}

/// No fleet stored yet: 502 when the source is failing, 503 while waiting.
fn no_telemetry(state: &AppState) -> ApiResponse {
    match state.source_error() {
        Some(err) => ApiResponse::error(
            StatusCode::BAD_GATEWAY,
            format!("telemetry source failed: {err}"),
        ),
        None => ApiResponse::error(StatusCode::SERVICE_UNAVAILABLE, "no telemetry received yet"),
    }
}

fn clusters(state: &AppState) -> Result<ApiResponse, ApiResponse> {
    let fleet = state.latest_fleet().ok_or_else(|| no_telemetry(state))?;
    Ok(ApiResponse::ok(&fleet))
}

fn incidents(state: &AppState, req: &ApiRequest, now: Timestamp) -> Result<ApiResponse, ApiResponse> {
    let before = match req.param("before") {
        Some(raw) => parse_before(&raw)?,
        None => Timestamp(u64::MAX),
    };
    let page = state.book().before(before, PAGE_SIZE);
    Ok(ApiResponse::ok(&IncidentList::new(now, page)))
}

fn incident(state: &AppState, raw_id: &str) -> Result<ApiResponse, ApiResponse> {
    let id = parse_incident_id(raw_id)?;
    let incident = state.book().get(&id)?;
    Ok(ApiResponse::ok(&incident))
}

fn update(state: &AppState, raw_id: &str) -> Result<ApiResponse, ApiResponse> {
    let id = UpdateId::parse(raw_id)
        .map_err(|e| ApiResponse::error(StatusCode::BAD_REQUEST, e.to_string()))?;
    let (incident_id, update) = state.book().update(&id)?;
    Ok(ApiResponse::ok(&UpdateView {
        incident_id: &incident_id,
        update: &update,
    }))
}

fn shard(state: &AppState, req: &ApiRequest) -> Result<ApiResponse, ApiResponse> {
    let guild_id = req.param("guild_id").ok_or_else(|| {
        ApiResponse::error(StatusCode::BAD_REQUEST, "missing 'guild_id' parameter")
    })?;
    let fleet = state.latest_fleet();

    let shards_total = match req.param("shards_total") {
        Some(raw) => raw.parse::<u32>().map_err(|_| {
            ApiResponse::error(
                StatusCode::BAD_REQUEST,
                format!("invalid 'shards_total' parameter '{raw}'"),
            )
        })?,
        // A pending cluster hides its shards, so the known count is short.
        None => fleet
            .as_ref()
            .filter(|f| f.clusters.iter().all(|c| c.shards.is_some()))
            .map(|f| f.num_shards)
            .filter(|n| *n > 0)
            .ok_or_else(|| no_telemetry(state))?,
    };

    let shard_id = shard_index(&guild_id, shards_total)?;
    let cluster_id = u32::try_from(shard_id)
        .ok()
        .and_then(|s| fleet.as_ref()?.cluster_of(s).map(|c| c.id));

    Ok(ApiResponse::ok(&ShardView {
        guild_id,
        shards_total,
        shard_id,
        cluster_id,
    }))
}

fn admin(
    state: &AppState,
    method: &Method,
    rest: &[&str],
    body: &[u8],
    now: Timestamp,
) -> Result<ApiResponse, ApiResponse> {
    let book = state.book();
    match (method, rest) {
        (&Method::POST, ["incidents"]) => {
            let open: OpenIncident = parse_body(body)?;
            let details = IncidentDetails {
                name: open.name,
                description: open.description,
                impact: open.impact,
            };
            let incident = if open.maintenance {
                book.open_maintenance(details, open.text, now)?
            } else {
                book.open(details, open.text, now)?
            };
            Ok(ApiResponse::json(StatusCode::CREATED, &incident))
        }
        (&Method::PATCH, ["incidents", id]) => {
            let id = parse_incident_id(id)?;
            let patch: IncidentPatch = parse_body(body)?;
            Ok(ApiResponse::ok(&book.amend(&id, patch)?))
        }
        (&Method::DELETE, ["incidents", id]) => {
            let id = parse_incident_id(id)?;
            Ok(ApiResponse::ok(&book.delete(&id)?))
        }
        (&Method::POST, ["incidents", id, "update"]) => {
            let id = parse_incident_id(id)?;
            let post: PostUpdate = parse_body(body)?;
            Ok(ApiResponse::ok(
                &book.post_update(&id, post.text, post.status, now)?,
            ))
        }
        (&Method::POST, ["incidents", id, "resolve"]) => {
            let id = parse_incident_id(id)?;
            let resolve: Resolve = parse_body(body)?;
            Ok(ApiResponse::ok(&book.resolve(&id, resolve.text, now)?))
        }
        _ => Ok(ApiResponse::not_found()),
    }
}
