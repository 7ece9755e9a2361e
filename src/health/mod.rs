//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     config → checks.rs (self, sqlite, per-downstream HTTP probes)
//!     → registry.rs (named checks with tag sets)
//!
//! GET /health/ready | /health/live:
//!     registry.evaluate(tag)
//!     → run matching probes concurrently, each with a timeout
//!     → report.rs (aggregate, render JSON, 200 / 500)
//! ```
//!
//! # Design Decisions
//! - Readiness includes dependencies; liveness is only the self check
//! - A failing, slow or panicking probe is "down", never skipped
//! - Registry is read-mostly and lock-free for readers

pub mod check;
pub mod checks;
pub mod registry;
pub mod report;

pub use check::{HealthCheck, HealthCheckResult, HealthError, HealthStatus, LIVE, READY};
pub use checks::{FnCheck, HttpCheck, SelfCheck, SqliteCheck};
pub use registry::HealthRegistry;
pub use report::HealthReport;
