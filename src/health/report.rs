//! Health report rendering.
//!
//! Wire shape (fixed, consumed by orchestrator probes and dashboards):
//! `{"status": "ready" | "not-ready", "details": {"<check>": "up" | "down"}}`

use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::ser::{Serialize, SerializeMap, SerializeStruct, Serializer};

use crate::health::check::{HealthCheckResult, HealthStatus};

/// Aggregated result of one `evaluate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub details: BTreeMap<String, HealthStatus>,
}

impl HealthReport {
    /// Healthy iff every result is healthy; an empty set is healthy.
    pub fn from_results(results: &[HealthCheckResult]) -> Self {
        let details: BTreeMap<String, HealthStatus> = results
            .iter()
            .map(|r| (r.name.clone(), r.status))
            .collect();
        let status = if details.values().all(HealthStatus::is_healthy) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };
        Self { status, details }
    }

    pub fn is_healthy(&self) -> bool {
        self.status.is_healthy()
    }

    pub fn status_label(&self) -> &'static str {
        if self.is_healthy() {
            "ready"
        } else {
            "not-ready"
        }
    }

    pub fn http_status(&self) -> StatusCode {
        if self.is_healthy() {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

struct Details<'a>(&'a BTreeMap<String, HealthStatus>);

impl Serialize for Details<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, status) in self.0 {
            map.serialize_entry(name, status.as_detail())?;
        }
        map.end()
    }
}

impl Serialize for HealthReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut report = serializer.serialize_struct("HealthReport", 2)?;
        report.serialize_field("status", self.status_label())?;
        report.serialize_field("details", &Details(&self.details))?;
        report.end()
    }
}

impl IntoResponse for HealthReport {
    fn into_response(self) -> Response {
        (self.http_status(), Json(&self)).into_response()
    }
}
