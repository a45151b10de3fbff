//! Collector HTTP surface.
//!
//! Routes:
//! - `POST /Send` (authorized): body is pre-formatted batch text; each
//!   non-empty line is refiled into the partition named by the line's own
//!   embedded date, so a drained backlog lands under its original dates.
//! - `GET /getLogs`: read-back query over the stored partitions.
//! - `GET /checkConnection` (authorized): liveness probe for shippers.
//! - `GET /health`: unauthenticated liveness for infrastructure.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Response, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::TokenVerifier;
use crate::record;
use crate::store::{DateFileStore, SortOrder};

/// Errors that can occur while running the collector server.
#[derive(Debug)]
pub enum ServerError {
    /// Binding the listen address failed.
    Bind(SocketAddr, io::Error),

    /// The accept loop terminated with an I/O error.
    Serve(io::Error),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Bind(addr, e) => write!(f, "failed to bind {}: {}", addr, e),
            ServerError::Serve(e) => write!(f, "server error: {}", e),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Bind(_, e) | ServerError::Serve(e) => Some(e),
        }
    }
}

/// Shared state behind the collector routes.
pub struct CollectorState {
    /// Partitioned storage; the mutex serializes ingest writes.
    store: Mutex<DateFileStore>,

    /// Bearer-token verifier collaborator.
    verifier: Arc<dyn TokenVerifier>,
}

impl CollectorState {
    /// Create collector state over a store and a verifier.
    pub fn new(store: DateFileStore, verifier: Arc<dyn TokenVerifier>) -> Self {
        Self {
            store: Mutex::new(store),
            verifier,
        }
    }
}

/// Response body for `POST /Send`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSummary {
    /// Overall outcome: always `"ok"` when the request was processed.
    pub status: String,

    /// Lines filed into a partition.
    pub accepted: u64,

    /// Lines refused for a malformed embedded timestamp.
    pub rejected: u64,
}

/// Query parameters for `GET /getLogs`.
#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    /// Inclusive range start, `YYYYMMDD`.
    pub from: Option<String>,

    /// Inclusive range end, `YYYYMMDD`.
    pub to: Option<String>,

    /// `asc` or `desc` (default `desc`).
    pub order: Option<String>,
}

/// Create the collector router.
pub fn create_router(state: Arc<CollectorState>) -> Router {
    Router::new()
        .route("/Send", post(send))
        .route("/getLogs", get(get_logs))
        .route("/checkConnection", get(check_connection))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Run the collector server until it fails or the shutdown future
/// resolves.
///
/// # Errors
///
/// Returns an error if binding the address or serving fails.
pub async fn serve(
    state: Arc<CollectorState>,
    addr: SocketAddr,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(addr, e))?;

    info!(addr = %addr, "Collector listening");

    let router = create_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServerError::Serve)
}

/// Check the bearer token on a request, producing a 401 response when it
/// is missing or refused by the verifier.
async fn authorize(state: &CollectorState, headers: &HeaderMap) -> Result<(), Response<Body>> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let Some(token) = token else {
        return Err((StatusCode::UNAUTHORIZED, "missing bearer token").into_response());
    };

    match state.verifier.verify(token).await {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!(error = %e, "Request refused by token verifier");
            Err((StatusCode::UNAUTHORIZED, "invalid bearer token").into_response())
        }
    }
}

/// `POST /Send`: file each line of the batch under its embedded date.
async fn send(
    State(state): State<Arc<CollectorState>>,
    headers: HeaderMap,
    body: String,
) -> Response<Body> {
    if let Err(refused) = authorize(&state, &headers).await {
        return refused;
    }

    let mut accepted: u64 = 0;
    let mut rejected: u64 = 0;

    let store = state.store.lock().await;
    for line in body.lines() {
        if line.is_empty() {
            continue;
        }

        let date = match record::partition_date(line) {
            Ok(date) => date,
            Err(e) => {
                // Reported, counted, never silently dropped.
                warn!(error = %e, "Rejecting line with unparsable embedded date");
                rejected += 1;
                continue;
            }
        };

        if let Err(e) = store.append(date, line).await {
            warn!(error = %e, %date, "Failed to file incoming line");
            return (StatusCode::INTERNAL_SERVER_ERROR, "storage failure").into_response();
        }
        accepted += 1;
    }
    drop(store);

    info!(accepted, rejected, "Ingested batch");

    Json(IngestSummary {
        status: "ok".to_string(),
        accepted,
        rejected,
    })
    .into_response()
}

/// `GET /getLogs`: newline-joined listing over an optional date range.
async fn get_logs(
    State(state): State<Arc<CollectorState>>,
    Query(query): Query<LogsQuery>,
) -> Response<Body> {
    let from = match parse_stamp(query.from.as_deref()) {
        Ok(date) => date,
        Err(resp) => return resp,
    };
    let to = match parse_stamp(query.to.as_deref()) {
        Ok(date) => date,
        Err(resp) => return resp,
    };

    let order = match query.order.as_deref() {
        None | Some("desc") => SortOrder::Descending,
        Some("asc") => SortOrder::Ascending,
        Some(other) => {
            return (
                StatusCode::BAD_REQUEST,
                format!("unknown order '{}', expected 'asc' or 'desc'", other),
            )
                .into_response();
        }
    };

    let store = state.store.lock().await;
    match store.list(from, to, order).await {
        Ok(lines) => lines.join("\n").into_response(),
        Err(e) => {
            warn!(error = %e, "Read-back query failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "storage failure").into_response()
        }
    }
}

/// `GET /checkConnection`: authorized liveness probe.
async fn check_connection(
    State(state): State<Arc<CollectorState>>,
    headers: HeaderMap,
) -> Response<Body> {
    match authorize(&state, &headers).await {
        Ok(()) => "Connection successful!".into_response(),
        Err(refused) => refused,
    }
}

/// `GET /health`: unauthenticated liveness.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "service": "log-relay-collector" }))
}

/// Parse an optional `YYYYMMDD` query value.
fn parse_stamp(value: Option<&str>) -> Result<Option<NaiveDate>, Response<Body>> {
    match value {
        None => Ok(None),
        Some(stamp) => NaiveDate::parse_from_str(stamp, "%Y%m%d")
            .map(Some)
            .map_err(|_| {
                (
                    StatusCode::BAD_REQUEST,
                    format!("invalid date '{}', expected YYYYMMDD", stamp),
                )
                    .into_response()
            }),
    }
}
