//! Outbound trace header injection.
//!
//! # Rules
//! - trace id and request id are reused from the inbound request, else generated
//! - span id is always fresh for the new hop
//! - parent span id is the inbound span id, and only present if that was
//! - sampled is forced to "1" and flags to "0"
//! - the service's own name/version ride along as x-app-source / x-app-version
//!
//! Headers the caller already set on the outbound request are never replaced.

use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::config::ServiceIdentity;
use crate::propagation::context::{InboundTrace, TraceContext};
use crate::propagation::headers::{
    header_text, X_APP_SOURCE, X_APP_VERSION, X_B3_FLAGS, X_B3_PARENT_SPAN_ID, X_B3_SAMPLED,
    X_B3_SPAN_ID, X_B3_TRACE_ID, X_REQUEST_ID,
};
use crate::propagation::ids::{IdGenerator, RandomIdGenerator};

/// Computes and attaches tracing headers for outbound calls.
#[derive(Clone)]
pub struct TraceContextPropagator {
    identity: ServiceIdentity,
    ids: Arc<dyn IdGenerator>,
}

impl TraceContextPropagator {
    pub fn new(identity: ServiceIdentity) -> Self {
        Self::with_id_generator(identity, Arc::new(RandomIdGenerator))
    }

    pub fn with_id_generator(identity: ServiceIdentity, ids: Arc<dyn IdGenerator>) -> Self {
        Self { identity, ids }
    }

    pub fn identity(&self) -> &ServiceIdentity {
        &self.identity
    }

    /// Generator shared with the ingress middleware.
    pub fn id_generator(&self) -> Arc<dyn IdGenerator> {
        self.ids.clone()
    }

    /// Derive the context for a new outbound hop.
    pub fn outbound_context(&self, inbound: Option<&InboundTrace>) -> TraceContext {
        let inbound = inbound.cloned().unwrap_or_default();
        TraceContext {
            trace_id: inbound.trace_id.unwrap_or_else(|| self.ids.trace_id()),
            span_id: self.ids.span_id(),
            parent_span_id: inbound.span_id,
            request_id: inbound.request_id.unwrap_or_else(|| self.ids.request_id()),
            sampled: true,
            flags: 0,
        }
    }

    /// Merge tracing and identity headers into `headers` and return the
    /// context actually sent. Ids the caller preset win over computed ones.
    pub fn inject(&self, inbound: Option<&InboundTrace>, headers: &mut HeaderMap) -> TraceContext {
        let mut ctx = self.outbound_context(inbound);

        set_if_absent(headers, X_REQUEST_ID, &ctx.request_id);
        set_if_absent(headers, X_B3_TRACE_ID, &ctx.trace_id);
        set_if_absent(headers, X_B3_SPAN_ID, &ctx.span_id);
        set_if_absent(headers, X_B3_SAMPLED, ctx.sampled_header());
        set_if_absent(headers, X_B3_FLAGS, &ctx.flags_header());
        if let Some(parent) = &ctx.parent_span_id {
            set_if_absent(headers, X_B3_PARENT_SPAN_ID, parent);
        }
        set_if_absent(headers, X_APP_SOURCE, &self.identity.name);
        set_if_absent(headers, X_APP_VERSION, &self.identity.version);

        adopt_sent(headers, &X_REQUEST_ID, &mut ctx.request_id);
        adopt_sent(headers, &X_B3_TRACE_ID, &mut ctx.trace_id);
        adopt_sent(headers, &X_B3_SPAN_ID, &mut ctx.span_id);
        if let Some(parent) = header_text(headers, &X_B3_PARENT_SPAN_ID) {
            ctx.parent_span_id = Some(parent.to_owned());
        }

        tracing::trace!(
            trace_id = %ctx.trace_id,
            span_id = %ctx.span_id,
            parent_span_id = ?ctx.parent_span_id,
            request_id = %ctx.request_id,
            "Injected trace headers"
        );

        ctx
    }
}

impl std::fmt::Debug for TraceContextPropagator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceContextPropagator")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

fn adopt_sent(headers: &HeaderMap, name: &HeaderName, value: &mut String) {
    if let Some(sent) = header_text(headers, name) {
        if sent != value.as_str() {
            *value = sent.to_owned();
        }
    }
}

fn set_if_absent(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    if headers.contains_key(&name) {
        return;
    }
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(name, v);
        }
        Err(_) => {
            tracing::warn!(header = %name, "Skipping header with unencodable value");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::ids::is_hex_id;
    use std::collections::HashSet;

    fn propagator(name: &str) -> TraceContextPropagator {
        TraceContextPropagator::new(ServiceIdentity {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            instance_id: None,
        })
    }

    fn header<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
        headers.get(name).map(|v| v.to_str().unwrap())
    }

    #[test]
    fn no_inbound_context_synthesizes_everything() {
        let mut headers = HeaderMap::new();
        let ctx = propagator("movies").inject(None, &mut headers);

        assert!(is_hex_id(&ctx.trace_id));
        assert!(is_hex_id(&ctx.span_id));
        assert!(!ctx.request_id.is_empty());
        assert_eq!(header(&headers, &X_B3_TRACE_ID), Some(ctx.trace_id.as_str()));
        assert_eq!(header(&headers, &X_B3_SPAN_ID), Some(ctx.span_id.as_str()));
        assert_eq!(header(&headers, &X_REQUEST_ID), Some(ctx.request_id.as_str()));
        assert!(!headers.contains_key(X_B3_PARENT_SPAN_ID));
        assert_eq!(header(&headers, &X_B3_SAMPLED), Some("1"));
        assert_eq!(header(&headers, &X_B3_FLAGS), Some("0"));
        assert_eq!(header(&headers, &X_APP_SOURCE), Some("movies"));
        assert_eq!(header(&headers, &X_APP_VERSION), Some("1.0.0"));
    }

    #[test]
    fn inbound_trace_is_reused_and_span_becomes_parent() {
        let inbound = InboundTrace {
            trace_id: Some("00000000000000a0".into()),
            span_id: Some("00000000000000b0".into()),
            request_id: Some("req-1".into()),
        };
        let mut headers = HeaderMap::new();
        let ctx = propagator("movies").inject(Some(&inbound), &mut headers);

        assert_eq!(ctx.trace_id, "00000000000000a0");
        assert_eq!(ctx.request_id, "req-1");
        assert_eq!(ctx.parent_span_id.as_deref(), Some("00000000000000b0"));
        assert_ne!(ctx.span_id, "00000000000000b0");
        assert_eq!(header(&headers, &X_B3_PARENT_SPAN_ID), Some("00000000000000b0"));
    }

    #[test]
    fn trace_without_span_omits_parent() {
        let inbound = InboundTrace {
            trace_id: Some("00000000000000a0".into()),
            ..Default::default()
        };
        let mut headers = HeaderMap::new();
        let ctx = propagator("movies").inject(Some(&inbound), &mut headers);

        assert_eq!(ctx.trace_id, "00000000000000a0");
        assert!(ctx.parent_span_id.is_none());
        assert!(!headers.contains_key(X_B3_PARENT_SPAN_ID));
    }

    #[test]
    fn explicit_headers_are_not_overridden() {
        let mut headers = HeaderMap::new();
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("caller-chosen"));
        headers.insert(X_APP_SOURCE, HeaderValue::from_static("override"));

        propagator("movies").inject(None, &mut headers);

        assert_eq!(header(&headers, &X_REQUEST_ID), Some("caller-chosen"));
        assert_eq!(header(&headers, &X_APP_SOURCE), Some("override"));
        assert_eq!(headers.get_all(X_REQUEST_ID).iter().count(), 1);
    }

    #[test]
    fn returned_context_matches_preset_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("caller-chosen"));
        headers.insert(X_B3_TRACE_ID, HeaderValue::from_static("00000000000000c1"));
        headers.insert(X_B3_SPAN_ID, HeaderValue::from_static("00000000000000c2"));
        headers.insert(X_B3_PARENT_SPAN_ID, HeaderValue::from_static("00000000000000c3"));

        let inbound = InboundTrace {
            trace_id: Some("00000000000000a0".into()),
            span_id: Some("00000000000000b0".into()),
            request_id: Some("req-1".into()),
        };
        let ctx = propagator("movies").inject(Some(&inbound), &mut headers);

        assert_eq!(ctx.request_id, "caller-chosen");
        assert_eq!(ctx.trace_id, "00000000000000c1");
        assert_eq!(ctx.span_id, "00000000000000c2");
        assert_eq!(ctx.parent_span_id.as_deref(), Some("00000000000000c3"));
        assert_eq!(header(&headers, &X_B3_TRACE_ID), Some(ctx.trace_id.as_str()));
    }

    #[test]
    fn chain_of_hops_links_parents() {
        let services = ["backend", "movies", "ratings", "reviews"];
        let mut inbound: Option<InboundTrace> = None;
        let mut hops = Vec::new();

        for name in services {
            let mut headers = HeaderMap::new();
            let ctx = propagator(name).inject(inbound.as_ref(), &mut headers);
            inbound = Some(InboundTrace::from_headers(&headers));
            hops.push(ctx);
        }

        let spans: HashSet<&str> = hops.iter().map(|h| h.span_id.as_str()).collect();
        assert_eq!(spans.len(), hops.len());
        assert!(hops[0].parent_span_id.is_none());
        for pair in hops.windows(2) {
            assert_eq!(pair[0].trace_id, pair[1].trace_id);
            assert_eq!(pair[0].request_id, pair[1].request_id);
            assert_eq!(pair[1].parent_span_id.as_deref(), Some(pair[0].span_id.as_str()));
        }
    }

    #[test]
    fn fan_out_calls_share_trace_but_not_span() {
        let inbound = InboundTrace {
            trace_id: Some("1111111111111111".into()),
            span_id: Some("2222222222222222".into()),
            request_id: Some("req".into()),
        };
        let p = propagator("movies");
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let p = p.clone();
                let inbound = inbound.clone();
                std::thread::spawn(move || p.outbound_context(Some(&inbound)))
            })
            .collect();
        let contexts: Vec<TraceContext> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let spans: HashSet<&str> = contexts.iter().map(|c| c.span_id.as_str()).collect();
        assert_eq!(spans.len(), contexts.len());
        assert!(contexts.iter().all(|c| c.trace_id == "1111111111111111"));
        assert!(contexts.iter().all(|c| c.request_id == "req"));
    }

    #[test]
    fn unencodable_identity_is_skipped() {
        let p = TraceContextPropagator::new(ServiceIdentity {
            name: "bad\nname".into(),
            version: "1".into(),
            instance_id: None,
        });
        let mut headers = HeaderMap::new();
        p.inject(None, &mut headers);

        assert!(!headers.contains_key(X_APP_SOURCE));
        assert!(headers.contains_key(X_B3_TRACE_ID));
    }
}
