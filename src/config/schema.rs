//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for a service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for an instrumented service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Identity this service reports to its callees.
    pub service: ServiceIdentity,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Health probe settings.
    pub health: HealthConfig,

    /// Downstream services this service calls.
    pub downstreams: Vec<DownstreamConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Name and version attached to outbound calls as `x-app-source` / `x-app-version`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceIdentity {
    pub name: String,
    pub version: String,
    pub instance_id: Option<String>,
}

impl Default for ServiceIdentity {
    fn default() -> Self {
        Self {
            name: "service".to_string(),
            version: "unknown".to_string(),
            instance_id: None,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration for inbound and outbound calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Inbound request deadline in seconds.
    pub request_secs: u64,

    /// Outbound call deadline in seconds.
    pub downstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            downstream_secs: 10,
        }
    }
}

/// Health probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Upper bound for a single probe, in milliseconds.
    pub probe_timeout_ms: u64,

    /// SQLite database file to ping. Registers the `sqlite` readiness check.
    pub sqlite_path: Option<String>,

    /// Register a readiness probe against every configured downstream.
    pub probe_downstreams: bool,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 2_000,
            sqlite_path: None,
            probe_downstreams: true,
        }
    }
}

/// A downstream service reachable over HTTP.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownstreamConfig {
    /// Name used for the relay route and the health check entry.
    pub name: String,

    /// Base URL (e.g., "http://ratings:8080").
    pub base_url: String,

    /// Path probed by the readiness check.
    #[serde(default = "default_health_path")]
    pub health_path: String,
}

fn default_health_path() -> String {
    "/health/ready".to_string()
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Install the Prometheus recorder and serve `/metrics`.
    pub metrics_enabled: bool,

    /// Path prefixes that bypass request instrumentation.
    pub excluded_prefixes: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            excluded_prefixes: vec![
                "/health".to_string(),
                "/metrics".to_string(),
                "/swagger".to_string(),
            ],
        }
    }
}
