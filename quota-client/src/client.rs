use chrono::{DateTime, Utc};
use reqwest::{Client as HttpClient, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Quota rate limiter client.
pub struct QuotaClient {
    http: HttpClient,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct CheckRequest<'a> {
    identifier: &'a str,
    resource: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    algorithm: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tier: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// A decoded `CheckResponse` (spec §6). `reset_at` is parsed from the
/// service's RFC3339 string into a `chrono::DateTime<Utc>`;
/// `retry_after` is whole seconds, matching the wire shape exactly.
#[derive(Debug, Clone)]
pub struct LimitCheckResult {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
    pub retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CheckResponseWire {
    allowed: bool,
    limit: u64,
    remaining: u64,
    reset_at: String,
    #[serde(default)]
    retry_after: Option<u64>,
}

impl TryFrom<CheckResponseWire> for LimitCheckResult {
    type Error = ClientError;

    fn try_from(w: CheckResponseWire) -> std::result::Result<Self, Self::Error> {
        let reset_at = DateTime::parse_from_rfc3339(&w.reset_at)
            .map_err(|e| ClientError::ConfigError(format!("malformed reset_at: {e}")))?
            .with_timezone(&Utc);
        Ok(Self {
            allowed: w.allowed,
            limit: w.limit,
            remaining: w.remaining,
            reset_at,
            retry_after: w.retry_after,
        })
    }
}

impl QuotaClient {
    /// Connect to a Quota service at the given base URL.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use quota_client::QuotaClient;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = QuotaClient::connect("http://localhost:8080")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn connect(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        if base_url.is_empty() {
            return Err(ClientError::ConfigError("base_url must not be empty".into()));
        }
        Ok(Self {
            http: HttpClient::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Check if a request should be allowed for `identifier` against
    /// `resource`, at cost `cost`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use quota_client::QuotaClient;
    /// # async fn example(client: QuotaClient) -> Result<(), Box<dyn std::error::Error>> {
    /// if client.check("user123", "api.search", 1).await? {
    ///     println!("Request allowed");
    /// } else {
    ///     println!("Rate limited");
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn check(&self, identifier: &str, resource: &str, cost: u64) -> Result<bool> {
        Ok(self.check_detailed(identifier, resource, cost, None).await?.allowed)
    }

    /// Same as [`Self::check`] but returns the full decision record, and
    /// lets the caller pick a non-default algorithm.
    pub async fn check_detailed(
        &self,
        identifier: &str,
        resource: &str,
        cost: u64,
        algorithm: Option<&str>,
    ) -> Result<LimitCheckResult> {
        self.check_detailed_tiered(identifier, resource, cost, algorithm, None).await
    }

    /// Same as [`Self::check_detailed`] but also lets the caller pick a
    /// named limit tier (spec §6 "limits (default + named tiers)").
    pub async fn check_detailed_tiered(
        &self,
        identifier: &str,
        resource: &str,
        cost: u64,
        algorithm: Option<&str>,
        tier: Option<&str>,
    ) -> Result<LimitCheckResult> {
        let body = CheckRequest {
            identifier,
            resource,
            count: Some(cost),
            algorithm,
            tier,
        };
        let resp = self
            .http
            .post(format!("{}/v1/check", self.base_url))
            .json(&body)
            .send()
            .await?;
        Self::parse_check_response(resp).await
    }

    /// Reads current status for `key` (the storage key, `identifier:resource`)
    /// without consuming any quota.
    pub async fn status(&self, key: &str, algorithm: Option<&str>) -> Result<LimitCheckResult> {
        let resp = self
            .http
            .get(self.keyed_url("status", key, algorithm, None))
            .send()
            .await?;
        Self::parse_check_response(resp).await
    }

    /// Resets `key` (an admin operation) back to its cold state.
    pub async fn reset(&self, key: &str, algorithm: Option<&str>) -> Result<()> {
        let resp = self
            .http
            .post(self.keyed_url("reset", key, algorithm, None))
            .send()
            .await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_from_response(resp).await)
        }
    }

    /// Runs `f` only if the rate limit allows the request.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use quota_client::{QuotaClient, ClientError};
    /// # async fn example(client: QuotaClient) -> Result<(), Box<dyn std::error::Error>> {
    /// let result = client.with_rate_limit("user123", "api.search", 1, async {
    ///     println!("Executing protected operation");
    ///     Ok::<_, ClientError>("Success")
    /// }).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn with_rate_limit<F, T>(
        &self,
        identifier: &str,
        resource: &str,
        cost: u64,
        f: F,
    ) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        if self.check(identifier, resource, cost).await? {
            f.await
        } else {
            Err(ClientError::RateLimited)
        }
    }

    fn keyed_url(&self, op: &str, key: &str, algorithm: Option<&str>, tier: Option<&str>) -> String {
        let mut params = Vec::new();
        if let Some(a) = algorithm {
            params.push(format!("algorithm={a}"));
        }
        if let Some(t) = tier {
            params.push(format!("tier={t}"));
        }
        if params.is_empty() {
            format!("{}/v1/{op}/{key}", self.base_url)
        } else {
            format!("{}/v1/{op}/{key}?{}", self.base_url, params.join("&"))
        }
    }

    async fn parse_check_response(resp: Response) -> Result<LimitCheckResult> {
        let status = resp.status();
        if status.is_success() || status == StatusCode::TOO_MANY_REQUESTS {
            let wire: CheckResponseWire = resp.json().await?;
            wire.try_into()
        } else {
            Err(Self::error_from_response(resp).await)
        }
    }

    async fn error_from_response(resp: Response) -> ClientError {
        let status = resp.status().as_u16();
        let message = resp
            .json::<ErrorBody>()
            .await
            .map(|b| b.error)
            .unwrap_or_else(|_| "unknown error".to_string());
        ClientError::ServerError { status, message }
    }
}
