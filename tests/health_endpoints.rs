//! Readiness and liveness over HTTP.

use axum::http::{header, StatusCode};
use mesh_telemetry::config::ServiceConfig;
use mesh_telemetry::health::FnCheck;
use mesh_telemetry::http::{build_router, AppState};

mod common;

#[tokio::test]
async fn failing_storage_makes_the_service_not_ready() {
    let mut config = ServiceConfig::default();
    config.health.sqlite_path = Some("/definitely/missing/dir/movies.db".into());
    let state = AppState::from_config(&config, None).unwrap();
    let router = build_router(state, &config);

    let response = common::send(&router, common::get("/health/ready")).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert_eq!(
        common::body_string(response).await,
        r#"{"status":"not-ready","details":{"self":"up","sqlite":"down"}}"#
    );
}

#[tokio::test]
async fn reachable_storage_is_ready() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ServiceConfig::default();
    config.health.sqlite_path = Some(dir.path().join("movies.db").to_string_lossy().into_owned());
    let state = AppState::from_config(&config, None).unwrap();
    let router = build_router(state, &config);

    let response = common::send(&router, common::get("/health/ready")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        common::body_string(response).await,
        r#"{"status":"ready","details":{"self":"up","sqlite":"up"}}"#
    );
}

#[tokio::test]
async fn liveness_ignores_readiness_only_checks() {
    let mut config = ServiceConfig::default();
    config.health.sqlite_path = Some("/definitely/missing/dir/movies.db".into());
    let state = AppState::from_config(&config, None).unwrap();
    state
        .health
        .register(FnCheck::fixed("cache", &["ready"], false))
        .unwrap();
    let router = build_router(state, &config);

    let response = common::send(&router, common::get("/health/live")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        common::body_string(response).await,
        r#"{"status":"ready","details":{"self":"up"}}"#
    );
}

#[tokio::test]
async fn health_probes_are_not_counted_as_traffic() {
    let config = ServiceConfig::default();
    let state = AppState::from_config(&config, None).unwrap();
    let metrics = state.metrics.clone();
    let router = build_router(state, &config);

    common::send(&router, common::get("/health/ready")).await;
    common::send(&router, common::get("/health/live")).await;
    common::send(&router, common::get("/")).await;

    assert_eq!(metrics.total_duration_samples(), 1);
    assert_eq!(metrics.request_count(200, "/"), 1);
}

#[tokio::test]
async fn metrics_route_is_404_without_a_recorder() {
    let config = ServiceConfig::default();
    let state = AppState::from_config(&config, None).unwrap();
    let router = build_router(state, &config);

    let response = common::send(&router, common::get("/metrics")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
