//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layer stack)
//!     → middleware/ (instrumentation, caller identity)
//!     → handlers.rs (service info, relay, health, metrics)
//!     → propagation client for downstream calls
//! ```

pub mod handlers;
pub mod middleware;
pub mod server;

pub use server::{build_router, with_observability, AppState, HttpServer, StartupError};
