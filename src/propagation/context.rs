//! Trace context carried between hops.

use axum::http::HeaderMap;

use crate::propagation::headers::{header_text, X_B3_SPAN_ID, X_B3_TRACE_ID, X_REQUEST_ID};
use crate::propagation::ids::IdGenerator;

/// Context emitted on one outbound hop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    /// Stable for the whole request chain.
    pub trace_id: String,
    /// Fresh for every hop.
    pub span_id: String,
    /// The inbound span id, when the caller sent one.
    pub parent_span_id: Option<String>,
    /// Stable for the whole request chain.
    pub request_id: String,
    pub sampled: bool,
    pub flags: u8,
}

impl TraceContext {
    pub fn sampled_header(&self) -> &'static str {
        if self.sampled {
            "1"
        } else {
            "0"
        }
    }

    pub fn flags_header(&self) -> String {
        self.flags.to_string()
    }
}

/// Tracing headers observed on an inbound request.
///
/// Every field is optional: a request from outside the mesh, or a background
/// task, has none of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundTrace {
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
    pub request_id: Option<String>,
}

impl InboundTrace {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            trace_id: header_text(headers, &X_B3_TRACE_ID).map(str::to_owned),
            span_id: header_text(headers, &X_B3_SPAN_ID).map(str::to_owned),
            request_id: header_text(headers, &X_REQUEST_ID).map(str::to_owned),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.trace_id.is_none() && self.span_id.is_none() && self.request_id.is_none()
    }

    /// Fill in a missing trace id and request id once, at ingress.
    ///
    /// Every outbound call made for the request then shares them. The span id
    /// is left as received, so a first hop still sends no parent.
    pub fn anchored(mut self, ids: &dyn IdGenerator) -> Self {
        if self.trace_id.is_none() {
            self.trace_id = Some(ids.trace_id());
        }
        if self.request_id.is_none() {
            self.request_id = Some(ids.request_id());
        }
        self
    }
}
