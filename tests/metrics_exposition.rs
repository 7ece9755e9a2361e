//! Prometheus exposition of the request instruments.
//!
//! Installs the global recorder, so it lives in its own test binary.

use mesh_telemetry::config::ServiceConfig;
use mesh_telemetry::http::{build_router, AppState};
use mesh_telemetry::observability::metrics::init_metrics;

mod common;

#[tokio::test]
async fn instruments_are_exported_under_their_fixed_names() {
    let handle = init_metrics().unwrap();
    let config = ServiceConfig::default();
    let state = AppState::from_config(&config, Some(handle)).unwrap();
    state.metrics.mark_up();
    let router = build_router(state, &config);

    common::send(&router, common::get("/")).await;
    common::send(&router, common::get("/")).await;

    let response = common::send(&router, common::get("/metrics")).await;
    assert!(response.status().is_success());
    let text = common::body_string(response).await;

    assert!(text.contains("up 1"), "{text}");
    assert!(text.contains("http_requests{"), "{text}");
    assert!(text.contains(r#"status="200""#), "{text}");
    assert!(text.contains(r#"endpoint="/""#), "{text}");
    assert!(text.contains("http_request_duration_bucket"), "{text}");
    assert!(text.contains("http_requests_in_progress"), "{text}");
}
