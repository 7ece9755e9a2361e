//! Request-scoped spans and the per-request context.
//!
//! # Responsibilities
//! - Hold the tags written while a request is being handled
//! - Carry the inbound trace headers to outbound calls
//! - Make both reachable from anywhere inside the request's task
//!
//! # Design Decisions
//! - One `ActiveSpan` per request, never shared across requests
//! - Parent links are weak; a child never keeps its parent alive
//! - The "current" span lives in a task-local scope, not a global

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::propagation::InboundTrace;

/// Value stored under a span tag.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl std::fmt::Display for TagValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TagValue::Str(s) => f.write_str(s),
            TagValue::Int(i) => write!(f, "{}", i),
            TagValue::Float(v) => write!(f, "{}", v),
            TagValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for TagValue {
    fn from(v: &str) -> Self {
        TagValue::Str(v.to_string())
    }
}

impl From<String> for TagValue {
    fn from(v: String) -> Self {
        TagValue::Str(v)
    }
}

impl From<i64> for TagValue {
    fn from(v: i64) -> Self {
        TagValue::Int(v)
    }
}

impl From<u16> for TagValue {
    fn from(v: u16) -> Self {
        TagValue::Int(v.into())
    }
}

impl From<f64> for TagValue {
    fn from(v: f64) -> Self {
        TagValue::Float(v)
    }
}

impl From<bool> for TagValue {
    fn from(v: bool) -> Self {
        TagValue::Bool(v)
    }
}

/// A span that is open while a request (or a unit of work inside it) runs.
#[derive(Debug)]
pub struct ActiveSpan {
    name: String,
    started_at: Instant,
    parent: Option<Weak<ActiveSpan>>,
    tags: Mutex<BTreeMap<String, TagValue>>,
}

impl ActiveSpan {
    /// Open a span with no enclosing span.
    pub fn root(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            started_at: Instant::now(),
            parent: None,
            tags: Mutex::new(BTreeMap::new()),
        })
    }

    /// Open a span enclosed by `self`.
    pub fn child(self: &Arc<Self>, name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            started_at: Instant::now(),
            parent: Some(Arc::downgrade(self)),
            tags: Mutex::new(BTreeMap::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The enclosing span, if it is still open.
    pub fn parent(&self) -> Option<Arc<ActiveSpan>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn set_tag(&self, key: impl Into<String>, value: impl Into<TagValue>) {
        self.lock_tags().insert(key.into(), value.into());
    }

    pub fn tag(&self, key: &str) -> Option<TagValue> {
        self.lock_tags().get(key).cloned()
    }

    /// Snapshot of all tags.
    pub fn tags(&self) -> BTreeMap<String, TagValue> {
        self.lock_tags().clone()
    }

    fn lock_tags(&self) -> MutexGuard<'_, BTreeMap<String, TagValue>> {
        // A panic while tagging must not take the rest of the request down.
        self.tags.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Everything the instrumentation knows about the request being handled.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub span: Arc<ActiveSpan>,
    pub inbound: InboundTrace,
}

impl RequestContext {
    pub fn new(span: Arc<ActiveSpan>, inbound: InboundTrace) -> Self {
        Self { span, inbound }
    }

    /// Context for a request that was not instrumented.
    pub fn detached(headers: &HeaderMap) -> Self {
        Self {
            span: ActiveSpan::root("detached"),
            inbound: InboundTrace::from_headers(headers),
        }
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_else(|| RequestContext::detached(&parts.headers)))
    }
}

tokio::task_local! {
    static REQUEST_CONTEXT: RequestContext;
}

/// Run `fut` with `ctx` as the current request context.
pub async fn scope<F>(ctx: RequestContext, fut: F) -> F::Output
where
    F: Future,
{
    REQUEST_CONTEXT.scope(ctx, fut).await
}

/// The current request context, `None` outside a request scope.
pub fn current_context() -> Option<RequestContext> {
    REQUEST_CONTEXT.try_with(Clone::clone).ok()
}

/// The span of the request being handled, if any.
pub fn current_span() -> Option<Arc<ActiveSpan>> {
    REQUEST_CONTEXT.try_with(|ctx| ctx.span.clone()).ok()
}

/// The inbound trace headers of the request being handled, if any.
pub fn current_inbound() -> Option<InboundTrace> {
    REQUEST_CONTEXT.try_with(|ctx| ctx.inbound.clone()).ok()
}
