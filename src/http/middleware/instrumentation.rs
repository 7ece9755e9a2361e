//! Request instrumentation middleware.
//!
//! # Responsibilities
//! - Open the request's ActiveSpan and bind its RequestContext
//! - In-flight gauge, duration histogram and status counter per request
//! - Skip the observability endpoints themselves
//!
//! The in-flight slot and the duration sample are owned by a `RequestGuard`
//! held across the handler, so they are released exactly once on every exit
//! path, including panics and client disconnects that drop the future.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::Instrument;

use crate::observability::metrics::{normalize_path, HttpMetrics};
use crate::observability::span::{self, ActiveSpan, RequestContext};
use crate::propagation::{IdGenerator, InboundTrace, RandomIdGenerator};

/// Endpoint label for requests no route matched.
pub const UNMATCHED_ENDPOINT: &str = "unmatched";

/// State shared by every invocation of [`instrument_requests`].
#[derive(Clone)]
pub struct RequestTelemetry {
    metrics: Arc<HttpMetrics>,
    excluded_prefixes: Arc<[String]>,
    ids: Arc<dyn IdGenerator>,
}

impl RequestTelemetry {
    pub fn new(metrics: Arc<HttpMetrics>, excluded_prefixes: Vec<String>) -> Self {
        Self {
            metrics,
            excluded_prefixes: excluded_prefixes.into(),
            ids: Arc::new(RandomIdGenerator),
        }
    }

    /// Generator for the trace id and request id of untraced requests.
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn metrics(&self) -> &Arc<HttpMetrics> {
        &self.metrics
    }

    /// True for paths that bypass instrumentation (health, metrics, docs).
    pub fn is_excluded(&self, normalized_path: &str) -> bool {
        self.excluded_prefixes
            .iter()
            .any(|prefix| normalized_path.starts_with(prefix.as_str()))
    }
}

impl std::fmt::Debug for RequestTelemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestTelemetry")
            .field("metrics", &self.metrics)
            .field("excluded_prefixes", &self.excluded_prefixes)
            .finish_non_exhaustive()
    }
}

/// Route template for the request, so the label stays low-cardinality.
fn endpoint_label(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| normalize_path(Some(matched.as_str())))
        .unwrap_or_else(|| UNMATCHED_ENDPOINT.to_string())
}

pub async fn instrument_requests(
    State(telemetry): State<RequestTelemetry>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = normalize_path(Some(request.uri().path()));
    if telemetry.is_excluded(&path) {
        return next.run(request).await;
    }

    let endpoint = endpoint_label(&request);
    let method = request.method().clone();
    // Chain ids are fixed here so every downstream call of this request shares them.
    let inbound = InboundTrace::from_headers(request.headers()).anchored(telemetry.ids.as_ref());

    let active = ActiveSpan::root(format!("{} {}", method, endpoint));
    active.set_tag("http.method", method.as_str());
    active.set_tag("http.route", endpoint.as_str());
    let ctx = RequestContext::new(active.clone(), inbound.clone());
    request.extensions_mut().insert(ctx.clone());

    let log_span = tracing::info_span!(
        "request",
        method = %method,
        endpoint = %endpoint,
        trace_id = inbound.trace_id.as_deref().unwrap_or_default(),
        request_id = inbound.request_id.as_deref().unwrap_or_default(),
        upstream_source = tracing::field::Empty,
        upstream_version = tracing::field::Empty,
    );

    let guard = telemetry.metrics.start_request(endpoint);
    let response = span::scope(ctx, next.run(request))
        .instrument(log_span.clone())
        .await;

    let status = response.status();
    guard.complete(status);
    active.set_tag("http.status_code", status.as_u16());
    if status.is_server_error() {
        active.set_tag("error", true);
    }

    log_span.in_scope(|| {
        tracing::debug!(
            status = status.as_u16(),
            elapsed_ms = active.elapsed().as_millis() as u64,
            tags = ?active.tags(),
            "Request completed"
        );
    });

    response
}
