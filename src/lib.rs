//! Observability fabric for services that call each other synchronously.
//!
//! # Architecture Overview
//!
//! ```text
//!     Inbound request
//!     ───────────────▶ TraceLayer
//!                        → instrumentation (span, in-flight, duration, status)
//!                          → timeout
//!                            → caller identity tags
//!                              → panic catcher
//!                                → handler ──▶ DownstreamClient ──▶ next service
//!                                               (trace headers, set-if-absent)
//!
//!     /health/ready, /health/live ──▶ HealthRegistry (tagged checks)
//!     /metrics                    ──▶ Prometheus exposition
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod propagation;

// Cross-cutting concerns
pub mod health;
pub mod lifecycle;
pub mod observability;

pub use config::schema::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
