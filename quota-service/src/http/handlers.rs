use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use quota_core::LimitInfo;

use crate::state::AppState;

use super::error::ApiError;
use super::types::{AlgorithmQuery, CheckRequest, CheckResponse, HealthResponse, MessageResponse};

/// `GET /health` — unauthenticated liveness probe.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::now())
}

/// `POST /v1/check` (spec §6). Missing `count` defaults to 1, missing
/// `algorithm` defaults to the dispatcher's configured default.
pub async fn check(
    State(state): State<AppState>,
    Json(req): Json<CheckRequest>,
) -> Result<Response, ApiError> {
    let count = req.count.unwrap_or(1);
    let key = AppState::storage_key(&req.identifier, &req.resource, req.tier.as_deref());

    let dispatcher = state.dispatcher(req.tier.as_deref())?;
    let (allowed, info) = dispatcher
        .decide(&key, &req.resource, req.algorithm.as_deref(), count)
        .await?;

    Ok(respond(allowed, info))
}

/// `GET /v1/status/:key?algorithm=` (spec §6). A pure probe: never
/// mutates stored state (`n=0`).
pub async fn status(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(q): Query<AlgorithmQuery>,
) -> Result<Response, ApiError> {
    let resource = resource_from_key(&key);
    let dispatcher = state.dispatcher(q.tier.as_deref())?;
    let info = dispatcher.status(&key, resource, q.algorithm.as_deref()).await?;
    Ok(respond(true, info))
}

/// `POST /v1/reset/:key?algorithm=` (spec §6: `{message}`).
pub async fn reset(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(q): Query<AlgorithmQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    let dispatcher = state.dispatcher(q.tier.as_deref())?;
    dispatcher.reset(&key, q.algorithm.as_deref()).await?;
    Ok(Json(MessageResponse {
        message: "rate limit reset successfully".to_string(),
    }))
}

/// Storage keys are `identifier:resource`; handlers that only see the key
/// (status/reset) recover the resource's dotted prefix for telemetry by
/// taking everything after the first `:`.
fn resource_from_key(key: &str) -> &str {
    key.splitn(2, ':').nth(1).unwrap_or(key)
}

fn respond(allowed: bool, info: LimitInfo) -> Response {
    let reset_header = super::types::to_epoch_secs(info.reset_at);
    let body = CheckResponse::from_decision(allowed, info);
    let status = if allowed {
        StatusCode::OK
    } else {
        StatusCode::TOO_MANY_REQUESTS
    };

    let mut headers = HeaderMap::new();
    headers.insert("X-RateLimit-Limit", HeaderValue::from(body.limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(body.remaining));
    headers.insert("X-RateLimit-Reset", HeaderValue::from(reset_header));
    if let Some(retry_after) = info.retry_after {
        if let Ok(v) = HeaderValue::from_str(&retry_after.as_secs().to_string()) {
            headers.insert("Retry-After", v);
        }
    }

    (status, headers, Json(body)).into_response()
}
