use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quota_core::LimitInfo;

/// `POST /v1/check` request body (spec §6). `count` and `algorithm` are
/// both optional — missing `count` means 1, missing `algorithm` means the
/// configured default.
#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub identifier: String,
    pub resource: String,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub algorithm: Option<String>,
    /// Named limit tier (spec §6 "limits (default + named tiers)").
    /// Missing ⇒ the `default` tier.
    #[serde(default)]
    pub tier: Option<String>,
}

/// `POST /v1/check` / `GET /v1/status/:key` response body (spec §6).
/// `reset_at` is an RFC3339 string in the body; the `X-RateLimit-Reset`
/// header carries the same instant as Unix seconds (spec §6).
#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub reset_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl CheckResponse {
    pub fn from_decision(allowed: bool, info: LimitInfo) -> Self {
        Self {
            allowed,
            limit: info.limit,
            remaining: info.remaining,
            reset_at: to_rfc3339(info.reset_at),
            retry_after: info.retry_after.map(|d| d.as_secs()),
        }
    }
}

fn to_rfc3339(t: SystemTime) -> String {
    DateTime::<Utc>::from(t).to_rfc3339()
}

pub fn to_epoch_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO).as_secs()
}

#[derive(Debug, Deserialize)]
pub struct AlgorithmQuery {
    pub algorithm: Option<String>,
    #[serde(default)]
    pub tier: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// `GET /health` response body (spec §6: `{status, time}`).
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub time: String,
}

impl HealthResponse {
    pub fn now() -> Self {
        Self {
            status: "ok",
            time: to_rfc3339(SystemTime::now()),
        }
    }
}

/// `POST /v1/reset/:key` response body (spec §6: `{message}`).
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
