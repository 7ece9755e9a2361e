//! Request handlers.

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::health::{HealthReport, LIVE, READY};
use crate::http::server::AppState;
use crate::observability::span::RequestContext;
use crate::propagation::ClientError;

/// Body of `GET /`.
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    pub trace_id: Option<String>,
    pub request_id: Option<String>,
    pub downstreams: Vec<String>,
}

pub async fn service_info(State(state): State<AppState>, ctx: RequestContext) -> Json<ServiceInfo> {
    let identity = state.propagator.identity();
    let mut downstreams: Vec<String> = state.downstreams.keys().cloned().collect();
    downstreams.sort();

    Json(ServiceInfo {
        service: identity.name.clone(),
        version: identity.version.clone(),
        instance_id: identity.instance_id.clone(),
        trace_id: ctx.inbound.trace_id.clone(),
        request_id: ctx.inbound.request_id.clone(),
        downstreams,
    })
}

pub async fn health_ready(State(state): State<AppState>) -> HealthReport {
    state.health.evaluate(READY).await
}

pub async fn health_live(State(state): State<AppState>) -> HealthReport {
    state.health.evaluate(LIVE).await
}

/// Prometheus text exposition. 404 when the recorder is not installed.
pub async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.prometheus {
        Some(handle) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}

pub async fn relay_root(
    State(state): State<AppState>,
    Path(downstream): Path<String>,
    ctx: RequestContext,
) -> Response {
    forward(&state, &downstream, "/", &ctx).await
}

pub async fn relay(
    State(state): State<AppState>,
    Path((downstream, path)): Path<(String, String)>,
    ctx: RequestContext,
) -> Response {
    forward(&state, &downstream, &path, &ctx).await
}

/// Call `downstream` on behalf of the current request and relay its answer.
async fn forward(state: &AppState, downstream: &str, path: &str, ctx: &RequestContext) -> Response {
    let Some(client) = state.downstreams.get(downstream) else {
        return (
            StatusCode::NOT_FOUND,
            format!("unknown downstream '{}'", downstream),
        )
            .into_response();
    };

    let call = ctx.span.child(format!("GET {}", downstream));
    call.set_tag("downstream.name", downstream);

    let response = match client.get(path, Some(&ctx.inbound)).await {
        Ok(response) => {
            call.set_tag("downstream.status", response.status.as_u16());
            call.set_tag("trace.id", response.trace.trace_id.as_str());

            let mut relayed = (response.status, response.body).into_response();
            if let Some(content_type) = response.headers.get(header::CONTENT_TYPE) {
                relayed
                    .headers_mut()
                    .insert(header::CONTENT_TYPE, content_type.clone());
            }
            relayed
        }
        Err(ClientError::Timeout(after)) => {
            call.set_tag("error", true);
            (
                StatusCode::GATEWAY_TIMEOUT,
                format!("downstream '{}' timed out after {:?}", downstream, after),
            )
                .into_response()
        }
        Err(e) => {
            call.set_tag("error", true);
            tracing::error!(downstream = %downstream, error = %e, "Downstream call failed");
            (StatusCode::BAD_GATEWAY, "downstream request failed").into_response()
        }
    };

    ctx.span.set_tag("downstream.status", response.status().as_u16());
    tracing::debug!(
        span = call.name(),
        parent = ctx.span.name(),
        elapsed_ms = call.elapsed().as_millis() as u64,
        tags = ?call.tags(),
        "Downstream call completed"
    );
    response
}
