//! HTTP surface of the query gateway.
//!
//! Routes map one-to-one onto query intents: parse filters, derive the cache
//! key, and go through the cache-or-execute path. Every backend failure
//! surfaces as HTTP 500 with `{"error": <message>}`; the diagnostic probes
//! additionally carry a `detail` field with the debug rendering of the
//! failure. Responses are gzip-compressed and CORS-open for the dashboard.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::cache::ResultCache;
use crate::filter::{FilterSet, RawFilterParams};
use crate::query::{
    cache_key, QueryIntent, QueryPlan, StatsDimension, PROBE_SEVERITY_SQL, PROBE_SQL, STATS_KEY,
};
use crate::storage::{StorageBackend, StoreError};

/// Severity buckets reported when the store has no severity data yet.
const SEVERITY_BUCKETS: [&str; 4] = ["ERROR", "WARNING", "INFO", "DEBUG"];

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn StorageBackend>,
    pub cache: ResultCache,
}

impl AppState {
    pub fn new(backend: Arc<dyn StorageBackend>, cache: ResultCache) -> Self {
        Self { backend, cache }
    }
}

/// Standard failure response: 500 with the raw error message.
pub struct ApiError(StoreError);

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

/// Failure response for the diagnostic probes, with extra detail.
pub struct DiagnosticError(StoreError);

impl From<StoreError> for DiagnosticError {
    fn from(err: StoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for DiagnosticError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "diagnostic probe failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": self.0.to_string(),
                "detail": format!("{:?}", self.0),
            })),
        )
            .into_response()
    }
}

/// Builds the gateway router with compression and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/logs", get(list_logs))
        .route("/logs/count", get(count_logs))
        .route("/logs/all", get(dump_logs))
        .route("/stats", get(stats))
        .route("/test", get(probe))
        .route("/test-severity", get(probe_severity))
        .route("/cache-stats", get(cache_stats))
        .route("/cache-clear", post(cache_clear))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// `GET /logs` — filtered, paginated row listing, newest first.
async fn list_logs(
    State(state): State<AppState>,
    Query(raw): Query<RawFilterParams>,
) -> Result<Json<Value>, ApiError> {
    let filter = FilterSet::parse(&raw);
    let key = cache_key(QueryIntent::ListRows, &filter);
    let plan = QueryPlan::build(&filter, QueryIntent::ListRows);
    tracing::debug!(query = %plan.render(), "listing events");

    let backend = state.backend.clone();
    let payload = state
        .cache
        .get_or_compute(&key, move || async move {
            backend.fetch_rows(plan).await.map(Value::Array)
        })
        .await?;
    Ok(Json(payload))
}

/// `GET /logs/count` — total matching rows for the filter set.
async fn count_logs(
    State(state): State<AppState>,
    Query(raw): Query<RawFilterParams>,
) -> Result<Json<Value>, ApiError> {
    let filter = FilterSet::parse(&raw);
    let key = cache_key(QueryIntent::CountRows, &filter);
    let plan = QueryPlan::build(&filter, QueryIntent::CountRows);

    let backend = state.backend.clone();
    let payload = state
        .cache
        .get_or_compute(&key, move || async move {
            backend.fetch_rows(plan).await.map(Value::Array)
        })
        .await?;

    let count = payload
        .get(0)
        .and_then(|row| row.get("count"))
        .cloned()
        .unwrap_or_else(|| Value::from(0));
    Ok(Json(json!({ "count": count })))
}

/// `GET /logs/all` — full unfiltered dump, newest first. Unbounded and
/// uncached by design.
async fn dump_logs(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let rows = state.backend.fetch_rows(QueryPlan::dump_all()).await?;
    tracing::info!(rows = rows.len(), "served full event dump");
    Ok(Json(Value::Array(rows)))
}

/// `GET /stats` — the four dashboard aggregates, computed as a concurrent
/// fan-out and cached under one shared key. If any query fails the whole
/// request fails; an empty severity result set is replaced by zero-filled
/// buckets.
async fn stats(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let backend = state.backend.clone();
    let payload = state
        .cache
        .get_or_compute(STATS_KEY, move || async move {
            let (volume, severity, source_names, event_types) = futures::try_join!(
                backend.fetch_rows(QueryPlan::aggregate(StatsDimension::DailyVolume)),
                backend.fetch_rows(QueryPlan::aggregate(StatsDimension::Severity)),
                backend.fetch_rows(QueryPlan::aggregate(StatsDimension::SourceName)),
                backend.fetch_rows(QueryPlan::aggregate(StatsDimension::EventType)),
            )?;

            let severity = if severity.is_empty() {
                SEVERITY_BUCKETS
                    .iter()
                    .map(|bucket| json!({ "Severity": bucket, "count": 0 }))
                    .collect()
            } else {
                severity
            };

            Ok::<_, StoreError>(json!({
                "volume": volume,
                "severity": severity,
                "sourceName": source_names,
                "eventType": event_types,
            }))
        })
        .await?;
    Ok(Json(payload))
}

/// `GET /test` — connectivity probe returning one raw row.
async fn probe(State(state): State<AppState>) -> Result<Json<Value>, DiagnosticError> {
    let rows = state.backend.fetch_rows(QueryPlan::raw(PROBE_SQL)).await?;
    Ok(Json(json!({ "success": true, "data": rows })))
}

/// `GET /test-severity` — distinct severity values with counts.
async fn probe_severity(State(state): State<AppState>) -> Result<Json<Value>, DiagnosticError> {
    let rows = state
        .backend
        .fetch_rows(QueryPlan::raw(PROBE_SEVERITY_SQL))
        .await?;
    Ok(Json(json!({ "success": true, "data": rows })))
}

/// `GET /cache-stats` — entry count, key list, and payload footprint.
async fn cache_stats(State(state): State<AppState>) -> Json<Value> {
    let stats = state.cache.stats().await;
    Json(json!(stats))
}

/// `POST /cache-clear` — operational control to drop all cached results.
async fn cache_clear(State(state): State<AppState>) -> Json<Value> {
    state.cache.clear().await;
    tracing::info!("cache cleared by operator request");
    Json(json!({ "success": true, "message": "Cache cleared" }))
}
