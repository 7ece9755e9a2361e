//! Trace context propagation subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request headers
//!     → context.rs (InboundTrace: trace id, span id, request id)
//!     → carried in the per-request RequestContext
//!
//! Outbound call:
//!     client.rs (DownstreamClient)
//!     → propagator.rs (derive TraceContext for the new hop, set-if-absent)
//!     → ids.rs (fresh 16-hex span ids, generated trace/request ids)
//!     → headers.rs (wire names)
//!     → downstream service
//! ```
//!
//! # Design Decisions
//! - Minimal B3-style header scheme, no W3C traceparent
//! - Sampling is always forced on
//! - Injection never fails a call; missing inputs only trigger generation

pub mod client;
pub mod context;
pub mod headers;
pub mod ids;
pub mod propagator;

pub use client::{ClientError, DownstreamClient, DownstreamResponse};
pub use context::{InboundTrace, TraceContext};
pub use ids::{IdGenerator, RandomIdGenerator};
pub use propagator::TraceContextPropagator;
