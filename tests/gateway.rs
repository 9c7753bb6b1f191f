//! End-to-end gateway scenarios against an in-memory DuckDB store.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use evquery_core::cache::ResultCache;
use evquery_core::service::{router, AppState};
use evquery_core::storage::duckdb::DuckDbBackend;
use evquery_core::storage::StorageBackend;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn empty_app() -> Router {
    let backend = DuckDbBackend::new_in_memory().unwrap();
    backend.init().await.unwrap();
    app_for(backend)
}

async fn seeded_app() -> Router {
    let backend = DuckDbBackend::new_in_memory().unwrap();
    backend.init().await.unwrap();

    // 25 ERROR rows on HOST1 with ascending event times, plus one INFO row on
    // HOST2 so filters have something to exclude.
    let mut sql = String::new();
    for i in 1..=25 {
        sql.push_str(&format!(
            "INSERT INTO windows_events (EventTime, Hostname, EventID, SourceName, Severity, Message, EventType) \
             VALUES ('2024-03-01 08:{:02}:00', 'HOST1', {}, 'Service Control Manager', 'ERROR', 'event-{}', 'AUDIT_FAILURE');\n",
            i,
            4600 + i,
            i,
        ));
    }
    sql.push_str(
        "INSERT INTO windows_events (EventTime, Hostname, EventID, SourceName, Severity, Message, EventType) \
         VALUES ('2024-03-01 09:00:00', 'HOST2', 7036, 'Winlogon', 'INFO', 'O''Brien logged on', 'AUDIT_SUCCESS');\n",
    );
    backend.execute_batch(&sql).await.unwrap();
    app_for(backend)
}

fn app_for(backend: DuckDbBackend) -> Router {
    let state = AppState::new(Arc::new(backend), ResultCache::new(Duration::from_secs(30)));
    router(state)
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn second_page_returns_rows_eleven_to_twenty_newest_first() {
    let app = seeded_app().await;
    let (status, body) = get_json(&app, "/logs?severity=ERROR&page=2&limit=10").await;

    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 10);
    // 25 matches newest-first: page 2 covers event-15 down to event-6.
    assert_eq!(rows[0]["Message"], "event-15");
    assert_eq!(rows[9]["Message"], "event-6");
}

#[tokio::test]
async fn count_matches_hostname_filter() {
    let app = seeded_app().await;
    let (status, body) = get_json(&app, "/logs/count?hostname=HOST1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "count": 25 }));
}

#[tokio::test]
async fn search_with_quote_matches_escaped_message() {
    let app = seeded_app().await;
    let (status, body) = get_json(&app, "/logs?search=O'Brien").await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["Hostname"], "HOST2");
}

#[tokio::test]
async fn full_dump_returns_everything_newest_first() {
    let app = seeded_app().await;
    let (status, body) = get_json(&app, "/logs/all").await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 26);
    assert_eq!(rows[0]["Message"], "O'Brien logged on");
    assert_eq!(rows[25]["Message"], "event-1");
}

#[tokio::test]
async fn stats_aggregates_seeded_data() {
    let app = seeded_app().await;
    let (status, body) = get_json(&app, "/stats").await;
    assert_eq!(status, StatusCode::OK);

    let severity = body["severity"].as_array().unwrap();
    assert_eq!(severity[0]["Severity"], "ERROR");
    assert_eq!(severity[0]["count"], 25);

    let volume = body["volume"].as_array().unwrap();
    assert_eq!(volume.len(), 1);
    assert_eq!(volume[0]["count"], 26);
    assert_eq!(volume[0]["event_date"], "2024-03-01");

    assert_eq!(body["sourceName"].as_array().unwrap().len(), 2);
    assert_eq!(body["eventType"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn stats_on_empty_store_yields_zeroed_severity_buckets() {
    let app = empty_app().await;
    let (status, body) = get_json(&app, "/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["severity"],
        json!([
            { "Severity": "ERROR", "count": 0 },
            { "Severity": "WARNING", "count": 0 },
            { "Severity": "INFO", "count": 0 },
            { "Severity": "DEBUG", "count": 0 },
        ])
    );
    assert_eq!(body["volume"], json!([]));
}

#[tokio::test]
async fn probes_report_success() {
    let app = seeded_app().await;

    let (status, body) = get_json(&app, "/test").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = get_json(&app, "/test-severity").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["Severity"], "ERROR");
    assert_eq!(body["data"][0]["count"], 25);
}

#[tokio::test]
async fn cached_listing_is_stable_across_repeat_requests() {
    let app = seeded_app().await;
    let (_, first) = get_json(&app, "/logs?severity=ERROR&limit=5").await;
    let (_, second) = get_json(&app, "/logs?severity=ERROR&limit=5").await;
    assert_eq!(first, second);

    let (_, stats) = get_json(&app, "/cache-stats").await;
    assert_eq!(stats["size"], 1);
}

#[tokio::test]
async fn malformed_pagination_falls_back_to_defaults() {
    let app = seeded_app().await;
    let (status, body) = get_json(&app, "/logs?page=zzz&limit=nope").await;
    assert_eq!(status, StatusCode::OK);
    // Defaults page=1 limit=50 cover all 26 rows.
    assert_eq!(body.as_array().unwrap().len(), 26);
}
