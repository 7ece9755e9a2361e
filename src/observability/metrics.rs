//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Track in-flight requests, per-status request counts and latency
//! - Mirror every update to the `metrics` facade for Prometheus scraping
//! - Keep an in-process view that tests and handlers can read back
//!
//! # Metrics
//! - `up` (up-down counter): 1 while the service is serving
//! - `http_requests` (counter): responses by `status`, `endpoint`
//! - `http_request_duration` (histogram, ms): latency by `endpoint`
//! - `http_requests_in_progress` (gauge): requests currently being handled
//!
//! These names and label keys are consumed by existing dashboards and must
//! not change.
//!
//! # Design Decisions
//! - Lock-free hot path: atomics, plus a sharded map for labelled series
//! - Constructed once at startup and injected, never a global singleton
//! - Duration and gauge release happen in a guard's `Drop`

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Instant;

use axum::http::StatusCode;
use dashmap::DashMap;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

pub const UP: &str = "up";
pub const HTTP_REQUESTS: &str = "http_requests";
pub const HTTP_REQUEST_DURATION: &str = "http_request_duration";
pub const HTTP_REQUESTS_IN_PROGRESS: &str = "http_requests_in_progress";

/// Histogram buckets for `http_request_duration`, in milliseconds.
const DURATION_BUCKETS_MS: &[f64] = &[
    5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1_000.0, 2_500.0, 5_000.0, 10_000.0,
];

/// Install the Prometheus recorder and describe the service instruments.
///
/// Can only succeed once per process.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(HTTP_REQUEST_DURATION.to_string()),
            DURATION_BUCKETS_MS,
        )?
        .install_recorder()?;

    describe_gauge!(UP, "1 if the app is running");
    describe_counter!(HTTP_REQUESTS, Unit::Count, "HTTP responses by status and endpoint");
    describe_histogram!(
        HTTP_REQUEST_DURATION,
        Unit::Milliseconds,
        "HTTP request duration in milliseconds"
    );
    describe_gauge!(HTTP_REQUESTS_IN_PROGRESS, Unit::Count, "In-progress HTTP requests");

    tracing::info!("Prometheus recorder installed");
    Ok(handle)
}

/// Trim a trailing slash; empty or missing paths become `/`.
pub fn normalize_path(path: Option<&str>) -> String {
    let path = path.map(str::trim).unwrap_or_default();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

#[derive(Debug, Default)]
struct DurationStats {
    count: AtomicU64,
    sum_micros: AtomicU64,
}

/// Request metrics shared by every request handler.
#[derive(Debug, Default)]
pub struct HttpMetrics {
    up: AtomicI64,
    in_flight: AtomicI64,
    peak_in_flight: AtomicI64,
    requests: DashMap<(u16, String), AtomicU64>,
    durations: DashMap<String, DurationStats>,
}

impl HttpMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the service as serving.
    pub fn mark_up(&self) {
        self.up.fetch_add(1, Ordering::SeqCst);
        gauge!(UP).increment(1.0);
    }

    /// Mark the service as no longer serving.
    pub fn mark_down(&self) {
        self.up.fetch_sub(1, Ordering::SeqCst);
        gauge!(UP).decrement(1.0);
    }

    pub fn up(&self) -> i64 {
        self.up.load(Ordering::SeqCst)
    }

    /// Start accounting for one request.
    ///
    /// The returned guard must live as long as the request is being handled.
    pub fn start_request(&self, endpoint: impl Into<String>) -> RequestGuard<'_> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        gauge!(HTTP_REQUESTS_IN_PROGRESS).increment(1.0);

        RequestGuard {
            metrics: self,
            endpoint: endpoint.into(),
            started_at: Instant::now(),
        }
    }

    pub fn in_flight(&self) -> i64 {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest in-flight value observed since startup.
    pub fn peak_in_flight(&self) -> i64 {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Count a response for `endpoint`.
    pub fn record_status(&self, status: StatusCode, endpoint: &str) {
        let key = (status.as_u16(), endpoint.to_string());
        match self.requests.get(&key) {
            Some(count) => {
                count.fetch_add(1, Ordering::Relaxed);
            }
            None => {
                self.requests
                    .entry(key)
                    .or_default()
                    .fetch_add(1, Ordering::Relaxed);
            }
        }

        counter!(
            HTTP_REQUESTS,
            "status" => status.as_u16().to_string(),
            "endpoint" => endpoint.to_string()
        )
        .increment(1);
    }

    fn record_duration(&self, endpoint: &str, started_at: Instant) {
        let elapsed = started_at.elapsed();
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);

        let add = |stats: &DurationStats| {
            stats.count.fetch_add(1, Ordering::Relaxed);
            stats.sum_micros.fetch_add(micros, Ordering::Relaxed);
        };
        match self.durations.get(endpoint) {
            Some(stats) => add(stats.value()),
            None => add(self.durations.entry(endpoint.to_string()).or_default().value()),
        }

        histogram!(HTTP_REQUEST_DURATION, "endpoint" => endpoint.to_string())
            .record(elapsed.as_secs_f64() * 1_000.0);
    }

    /// Responses counted for `status` on `endpoint`.
    pub fn request_count(&self, status: u16, endpoint: &str) -> u64 {
        self.requests
            .get(&(status, endpoint.to_string()))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Responses counted on `endpoint` across all statuses.
    pub fn endpoint_request_count(&self, endpoint: &str) -> u64 {
        self.requests
            .iter()
            .filter(|entry| entry.key().1 == endpoint)
            .map(|entry| entry.value().load(Ordering::Relaxed))
            .sum()
    }

    /// Duration samples recorded for `endpoint`.
    pub fn duration_samples(&self, endpoint: &str) -> u64 {
        self.durations
            .get(endpoint)
            .map(|s| s.count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Duration samples recorded across all endpoints.
    pub fn total_duration_samples(&self) -> u64 {
        self.durations
            .iter()
            .map(|entry| entry.value().count.load(Ordering::Relaxed))
            .sum()
    }

    /// Sum of recorded durations for `endpoint`, in milliseconds.
    pub fn duration_sum_ms(&self, endpoint: &str) -> f64 {
        self.durations
            .get(endpoint)
            .map(|s| s.sum_micros.load(Ordering::Relaxed) as f64 / 1_000.0)
            .unwrap_or(0.0)
    }
}

/// Accounting for one in-flight request.
///
/// Dropping the guard records the duration sample and releases the in-flight
/// slot, whether the request completed, failed, panicked or was cancelled.
#[derive(Debug)]
pub struct RequestGuard<'a> {
    metrics: &'a HttpMetrics,
    endpoint: String,
    started_at: Instant,
}

impl RequestGuard<'_> {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Record the final response status.
    pub fn complete(&self, status: StatusCode) {
        self.metrics.record_status(status, &self.endpoint);
    }
}

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        self.metrics.record_duration(&self.endpoint, self.started_at);
        self.metrics.in_flight.fetch_sub(1, Ordering::SeqCst);
        gauge!(HTTP_REQUESTS_IN_PROGRESS).decrement(1.0);
    }
}
