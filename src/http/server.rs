//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared `AppState` from a `ServiceConfig`
//! - Create the Axum Router with service and observability routes
//! - Wrap any router in the observability layer stack
//! - Serve until the shutdown signal, keeping the `up` gauge accurate

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};
use url::Url;

use crate::config::ServiceConfig;
use crate::health::{HealthError, HealthRegistry, HttpCheck, SelfCheck, SqliteCheck};
use crate::http::handlers;
use crate::http::middleware::{instrument_requests, tag_upstream_identity, RequestTelemetry};
use crate::observability::HttpMetrics;
use crate::propagation::{DownstreamClient, TraceContextPropagator};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("downstream '{name}' has an invalid URL: {source}")]
    InvalidDownstream {
        name: String,
        #[source]
        source: url::ParseError,
    },

    #[error("health check registration failed: {0}")]
    Health(#[from] HealthError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<HttpMetrics>,
    pub health: Arc<HealthRegistry>,
    pub propagator: Arc<TraceContextPropagator>,
    pub downstreams: Arc<HashMap<String, DownstreamClient>>,
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire metrics, health checks and downstream clients from `config`.
    pub fn from_config(
        config: &ServiceConfig,
        prometheus: Option<PrometheusHandle>,
    ) -> Result<Self, StartupError> {
        let propagator = Arc::new(TraceContextPropagator::new(config.service.clone()));
        let health = Arc::new(HealthRegistry::new(Duration::from_millis(
            config.health.probe_timeout_ms,
        )));
        health.register(SelfCheck::new())?;
        if let Some(path) = &config.health.sqlite_path {
            health.register(SqliteCheck::new(path))?;
        }

        let downstream_timeout = Duration::from_secs(config.timeouts.downstream_secs);
        let mut downstreams = HashMap::new();
        for downstream in &config.downstreams {
            let base_url =
                Url::parse(&downstream.base_url).map_err(|source| StartupError::InvalidDownstream {
                    name: downstream.name.clone(),
                    source,
                })?;

            if config.health.probe_downstreams {
                let probe_url = base_url.join(&downstream.health_path).map_err(|source| {
                    StartupError::InvalidDownstream {
                        name: downstream.name.clone(),
                        source,
                    }
                })?;
                health.register(HttpCheck::new(
                    downstream.name.clone(),
                    probe_url,
                    Duration::from_millis(config.health.probe_timeout_ms),
                ))?;
            }

            downstreams.insert(
                downstream.name.clone(),
                DownstreamClient::new(
                    downstream.name.clone(),
                    base_url,
                    propagator.clone(),
                    downstream_timeout,
                ),
            );
        }

        tracing::debug!(
            checks = ?health.check_names(),
            downstreams = downstreams.len(),
            "Application state built"
        );

        Ok(Self {
            metrics: Arc::new(HttpMetrics::new()),
            health,
            propagator,
            downstreams: Arc::new(downstreams),
            prometheus,
        })
    }

    pub fn telemetry(&self, config: &ServiceConfig) -> RequestTelemetry {
        RequestTelemetry::new(
            self.metrics.clone(),
            config.observability.excluded_prefixes.clone(),
        )
        .with_id_generator(self.propagator.id_generator())
    }
}

/// Wrap `router` in the observability stack.
///
/// Panics inside handlers become 500 responses before the instrumentation
/// sees them, so they are counted like any other failure.
#[allow(deprecated)]
pub fn with_observability(
    router: Router,
    telemetry: RequestTelemetry,
    request_timeout: Duration,
) -> Router {
    router
        .layer(CatchPanicLayer::new())
        .layer(middleware::from_fn(tag_upstream_identity))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(middleware::from_fn_with_state(telemetry, instrument_requests))
        .layer(TraceLayer::new_for_http())
}

/// Build the Axum router with all routes and middleware layers.
pub fn build_router(state: AppState, config: &ServiceConfig) -> Router {
    let telemetry = state.telemetry(config);
    let routes = Router::new()
        .route("/", get(handlers::service_info))
        .route("/relay/{downstream}", get(handlers::relay_root))
        .route("/relay/{downstream}/{*path}", get(handlers::relay))
        .route("/health/ready", get(handlers::health_ready))
        .route("/health/live", get(handlers::health_live))
        .route("/metrics", get(handlers::render_metrics))
        .with_state(state);

    with_observability(
        routes,
        telemetry,
        Duration::from_secs(config.timeouts.request_secs),
    )
}

/// HTTP server for an instrumented service.
pub struct HttpServer {
    router: Router,
    state: AppState,
    config: ServiceConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(
        config: ServiceConfig,
        prometheus: Option<PrometheusHandle>,
    ) -> Result<Self, StartupError> {
        let state = AppState::from_config(&config, prometheus)?;
        let router = build_router(state.clone(), &config);
        Ok(Self {
            router,
            state,
            config,
        })
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            service = %self.config.service.name,
            version = %self.config.service.version,
            "HTTP server starting"
        );

        let metrics = self.state.metrics.clone();
        metrics.mark_up();

        let result = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining requests");
            })
            .await;

        metrics.mark_down();
        tracing::info!("HTTP server stopped");
        result
    }
}
