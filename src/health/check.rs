//! Health check abstraction.

use futures_util::future::BoxFuture;
use thiserror::Error;

pub const READY: &str = "ready";
pub const LIVE: &str = "live";

/// Outcome of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    /// Rendering used in report details.
    pub fn as_detail(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "up",
            HealthStatus::Unhealthy => "down",
        }
    }
}

#[derive(Debug, Error)]
pub enum HealthError {
    #[error("check '{0}' is already registered")]
    DuplicateCheck(String),

    #[error("probe failed: {0}")]
    ProbeFailed(String),

    #[error("probe timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("probe panicked")]
    Panicked,

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

/// A named probe registered with the [`HealthRegistry`](super::HealthRegistry).
///
/// `probe` may perform I/O; the registry bounds it with a timeout.
pub trait HealthCheck: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn tags(&self) -> &[String];

    fn probe(&self) -> BoxFuture<'_, Result<(), HealthError>>;

    fn has_tag(&self, tag: &str) -> bool {
        self.tags().iter().any(|t| t == tag)
    }
}

/// Result of running one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckResult {
    pub name: String,
    pub status: HealthStatus,
    pub tags: Vec<String>,
}
