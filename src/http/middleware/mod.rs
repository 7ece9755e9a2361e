//! Inbound middleware.
//!
//! # Order (outermost first)
//! ```text
//! TraceLayer
//!   → instrumentation.rs (span, in-flight, duration, status)
//!     → request timeout
//!       → upstream_identity.rs (caller identity tags)
//!         → panic catcher
//!           → handler
//! ```

pub mod instrumentation;
pub mod upstream_identity;

pub use instrumentation::{instrument_requests, RequestTelemetry, UNMATCHED_ENDPOINT};
pub use upstream_identity::{
    apply_upstream_identity, tag_upstream_identity, UPSTREAM_APP_SOURCE, UPSTREAM_APP_VERSION,
};
