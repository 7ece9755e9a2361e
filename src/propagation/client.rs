//! HTTP client for calls to downstream services.
//!
//! Every request leaving through this client carries the trace headers of
//! the inbound request it was issued for.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use url::Url;

use crate::propagation::context::{InboundTrace, TraceContext};
use crate::propagation::propagator::TraceContextPropagator;

/// Largest downstream body buffered in memory.
const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid downstream URI: {0}")]
    InvalidUri(String),

    #[error("downstream request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    #[error("downstream did not answer within {0:?}")]
    Timeout(Duration),

    #[error("failed to read downstream body: {0}")]
    Body(#[from] axum::Error),
}

/// Buffered response from a downstream service.
#[derive(Debug, Clone)]
pub struct DownstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Context that was sent with the call.
    pub trace: TraceContext,
}

/// Client bound to one downstream base URL.
#[derive(Clone)]
pub struct DownstreamClient {
    name: String,
    base_url: Url,
    client: Client<HttpConnector, Body>,
    propagator: Arc<TraceContextPropagator>,
    timeout: Duration,
}

impl DownstreamClient {
    pub fn new(
        name: impl Into<String>,
        base_url: Url,
        propagator: Arc<TraceContextPropagator>,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            name: name.into(),
            base_url,
            client,
            propagator,
            timeout,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve `path` against the base URL, keeping any base path prefix.
    pub fn url_for(&self, path: &str) -> Result<Url, ClientError> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::InvalidUri(e.to_string()))
    }

    /// GET `path` on the downstream.
    pub async fn get(
        &self,
        path: &str,
        inbound: Option<&InboundTrace>,
    ) -> Result<DownstreamResponse, ClientError> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(self.url_for(path)?.as_str())
            .body(Body::empty())
            .map_err(|e| ClientError::InvalidUri(e.to_string()))?;
        self.send(request, inbound).await
    }

    /// Send a prepared request after merging trace headers into it.
    pub async fn send(
        &self,
        mut request: Request<Body>,
        inbound: Option<&InboundTrace>,
    ) -> Result<DownstreamResponse, ClientError> {
        let trace = self.propagator.inject(inbound, request.headers_mut());
        let uri = request.uri().clone();

        tracing::debug!(
            downstream = %self.name,
            uri = %uri,
            trace_id = %trace.trace_id,
            span_id = %trace.span_id,
            "Calling downstream"
        );

        let response = match tokio::time::timeout(self.timeout, self.client.request(request)).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(downstream = %self.name, uri = %uri, "Downstream call timed out");
                return Err(ClientError::Timeout(self.timeout));
            }
        };

        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(Body::new(body), MAX_BODY_BYTES).await?;

        Ok(DownstreamResponse {
            status: parts.status,
            headers: parts.headers,
            body,
            trace,
        })
    }
}

impl std::fmt::Debug for DownstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownstreamClient")
            .field("name", &self.name)
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}
