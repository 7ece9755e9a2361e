//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{HeaderMap, Request, Response},
    Json, Router,
};
use tokio::net::TcpListener;
use tower::ServiceExt;

use mesh_telemetry::config::ServiceConfig;
use mesh_telemetry::http::HttpServer;
use mesh_telemetry::lifecycle::Shutdown;

/// Every request header map an echo backend has received.
pub type Received = Arc<Mutex<Vec<BTreeMap<String, String>>>>;

fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
        .collect()
}

/// Start a backend that answers every request with the headers it received,
/// as a JSON object.
pub async fn start_echo_backend() -> (SocketAddr, Received) {
    let received: Received = Arc::default();
    let log = received.clone();

    let app = Router::new().fallback(move |headers: HeaderMap| {
        let log = log.clone();
        async move {
            let map = header_map(&headers);
            log.lock().unwrap().push(map.clone());
            Json(map)
        }
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, received)
}

/// Run a full service on an ephemeral port.
pub async fn start_service(config: ServiceConfig) -> (SocketAddr, Shutdown) {
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, None).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let rx = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    (addr, shutdown)
}

/// Config for a test service named `name`.
pub fn service_config(name: &str, version: &str) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.service.name = name.to_string();
    config.service.version = version.to_string();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.health.probe_downstreams = false;
    config
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Drive one request through `router` in-process.
pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn is_hex16(value: &str) -> bool {
    value.len() == 16
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}
