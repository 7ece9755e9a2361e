//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → http/middleware/instrumentation.rs
//!         → metrics.rs (in-flight gauge, duration histogram, status counter)
//!         → span.rs (ActiveSpan + RequestContext in a task-local scope)
//!     → http/middleware/upstream_identity.rs (tags the ActiveSpan)
//!     → handler
//!
//! Consumers:
//!     → logging.rs (structured log events, stdout)
//!     → Prometheus scrape of /metrics
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Trace and request ids flow through all log lines of a request
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
pub mod span;

pub use metrics::{normalize_path, HttpMetrics, RequestGuard};
pub use span::{current_inbound, current_span, ActiveSpan, RequestContext, TagValue};
