//! Wire names of the tracing and identity headers.
//!
//! These names are shared with every other service in the mesh and with the
//! sidecar proxies in front of them. They are lowercase so they can be used
//! directly as `HeaderName` constants.

use axum::http::HeaderName;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
pub const X_B3_TRACE_ID: HeaderName = HeaderName::from_static("x-b3-traceid");
pub const X_B3_SPAN_ID: HeaderName = HeaderName::from_static("x-b3-spanid");
pub const X_B3_PARENT_SPAN_ID: HeaderName = HeaderName::from_static("x-b3-parentspanid");
pub const X_B3_SAMPLED: HeaderName = HeaderName::from_static("x-b3-sampled");
pub const X_B3_FLAGS: HeaderName = HeaderName::from_static("x-b3-flags");
pub const X_APP_SOURCE: HeaderName = HeaderName::from_static("x-app-source");
pub const X_APP_VERSION: HeaderName = HeaderName::from_static("x-app-version");

/// Read a header as trimmed text. Missing, non-UTF8 and blank values are `None`.
pub fn header_text<'a>(headers: &'a axum::http::HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
