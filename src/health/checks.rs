//! Built-in health checks.
//!
//! - `SelfCheck`: the process is up (ready + live)
//! - `SqliteCheck`: the storage file opens and answers `SELECT 1` (ready)
//! - `HttpCheck`: a downstream's own health endpoint answers 2xx (ready)
//! - `FnCheck`: any closure, for custom probes

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use url::Url;

use crate::health::check::{HealthCheck, HealthError, LIVE, READY};

fn tags(list: &[&str]) -> Vec<String> {
    list.iter().map(|t| t.to_string()).collect()
}

/// Always healthy while the process can answer.
#[derive(Debug)]
pub struct SelfCheck {
    tags: Vec<String>,
}

impl SelfCheck {
    pub fn new() -> Self {
        Self {
            tags: tags(&[READY, LIVE]),
        }
    }
}

impl Default for SelfCheck {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthCheck for SelfCheck {
    fn name(&self) -> &str {
        "self"
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }

    fn probe(&self) -> BoxFuture<'_, Result<(), HealthError>> {
        futures_util::future::ready(Ok(())).boxed()
    }
}

/// Pings a SQLite database file.
#[derive(Debug)]
pub struct SqliteCheck {
    path: PathBuf,
    tags: Vec<String>,
}

impl SqliteCheck {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tags: tags(&[READY]),
        }
    }
}

impl HealthCheck for SqliteCheck {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }

    fn probe(&self) -> BoxFuture<'_, Result<(), HealthError>> {
        let path = self.path.clone();
        async move {
            tokio::task::spawn_blocking(move || -> Result<(), HealthError> {
                let conn = rusqlite::Connection::open(&path)?;
                conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
                Ok(())
            })
            .await
            .map_err(|_| HealthError::Panicked)?
        }
        .boxed()
    }
}

/// Probes a downstream service's health endpoint.
pub struct HttpCheck {
    name: String,
    url: Url,
    timeout: Duration,
    client: Client<HttpConnector, Body>,
    tags: Vec<String>,
}

impl HttpCheck {
    pub fn new(name: impl Into<String>, url: Url, timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            name: name.into(),
            url,
            timeout,
            client,
            tags: tags(&[READY]),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl std::fmt::Debug for HttpCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCheck")
            .field("name", &self.name)
            .field("url", &self.url.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HealthCheck for HttpCheck {
    fn name(&self) -> &str {
        &self.name
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }

    fn probe(&self) -> BoxFuture<'_, Result<(), HealthError>> {
        async move {
            let request = Request::builder()
                .method("GET")
                .uri(self.url.as_str())
                .header("user-agent", "mesh-telemetry-health-check")
                .body(Body::empty())
                .map_err(|e| HealthError::ProbeFailed(e.to_string()))?;

            match tokio::time::timeout(self.timeout, self.client.request(request)).await {
                Ok(Ok(response)) if response.status().is_success() => Ok(()),
                Ok(Ok(response)) => Err(HealthError::ProbeFailed(format!(
                    "non-success status {}",
                    response.status()
                ))),
                Ok(Err(e)) => Err(HealthError::ProbeFailed(e.to_string())),
                Err(_) => Err(HealthError::Timeout(self.timeout)),
            }
        }
        .boxed()
    }
}

type ProbeFn = dyn Fn() -> BoxFuture<'static, Result<(), HealthError>> + Send + Sync;

/// Closure-backed check.
pub struct FnCheck {
    name: String,
    tags: Vec<String>,
    probe: Arc<ProbeFn>,
}

impl FnCheck {
    pub fn new<F, Fut>(name: impl Into<String>, tags: &[&str], probe: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HealthError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            probe: Arc::new(move || probe().boxed()),
        }
    }

    /// A check with a fixed outcome.
    pub fn fixed(name: impl Into<String>, tags: &[&str], healthy: bool) -> Self {
        Self::new(name, tags, move || async move {
            if healthy {
                Ok(())
            } else {
                Err(HealthError::ProbeFailed("unhealthy".to_string()))
            }
        })
    }
}

impl std::fmt::Debug for FnCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCheck")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

impl HealthCheck for FnCheck {
    fn name(&self) -> &str {
        &self.name
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }

    fn probe(&self) -> BoxFuture<'_, Result<(), HealthError>> {
        (self.probe)()
    }
}
