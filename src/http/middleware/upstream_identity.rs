//! Caller identity tagging.
//!
//! Services in the mesh announce themselves on every outbound call with
//! `x-app-source` / `x-app-version`. This middleware copies those values onto
//! the active span as `upstream.app.source` / `upstream.app.version`.
//! Missing or blank headers write nothing.

use axum::{
    body::Body,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use crate::observability::span::{current_span, ActiveSpan};
use crate::propagation::headers::{header_text, X_APP_SOURCE, X_APP_VERSION};

pub const UPSTREAM_APP_SOURCE: &str = "upstream.app.source";
pub const UPSTREAM_APP_VERSION: &str = "upstream.app.version";

/// Tag `span` with the caller identity found in `headers`.
pub fn apply_upstream_identity(headers: &HeaderMap, span: &ActiveSpan) {
    if let Some(source) = header_text(headers, &X_APP_SOURCE) {
        span.set_tag(UPSTREAM_APP_SOURCE, source);
        tracing::Span::current().record("upstream_source", source);
    }
    if let Some(version) = header_text(headers, &X_APP_VERSION) {
        span.set_tag(UPSTREAM_APP_VERSION, version);
        tracing::Span::current().record("upstream_version", version);
    }
}

/// Middleware form of [`apply_upstream_identity`] for the current request span.
pub async fn tag_upstream_identity(request: Request<Body>, next: Next) -> Response {
    if let Some(span) = current_span() {
        apply_upstream_identity(request.headers(), &span);
    }
    next.run(request).await
}
