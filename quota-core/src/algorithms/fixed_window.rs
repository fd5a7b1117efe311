use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use super::{window_start, LimitInfo, RateLimitAlgorithm};
use crate::clock::Clock;
use crate::config::LimitConfig;
use crate::error::Result;
use crate::store::Store;

/// Fixed window counter decision procedure (spec §4.3).
///
/// Known semantic, not a bug: a caller can legally burst up to `2*limit`
/// across two adjacent windows.
pub struct FixedWindowAlgorithm<S: Store> {
    store: Arc<S>,
    config: LimitConfig,
    clock: Arc<dyn Clock>,
}

impl<S: Store> FixedWindowAlgorithm<S> {
    pub fn new(store: Arc<S>, config: LimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }
}

#[async_trait]
impl<S: Store> RateLimitAlgorithm for FixedWindowAlgorithm<S> {
    async fn decide(&self, key: &str, n: u64) -> Result<(bool, LimitInfo)> {
        let now = self.clock.now();
        let cur = window_start(now, self.config.window);

        let result = self
            .store
            .try_increment(key, cur, n, self.config.limit as f64)
            .await?;

        let reset_at = cur + self.config.window;
        let retry_after = if result.allowed {
            None
        } else {
            Some(reset_at.duration_since(now).unwrap_or(Duration::ZERO))
        };

        let info = LimitInfo {
            limit: self.config.limit,
            remaining: self.config.limit.saturating_sub(result.count),
            reset_at,
            retry_after,
        };

        trace!(key, allowed = result.allowed, remaining = info.remaining, "fixed_window decide");
        Ok((result.allowed, info))
    }

    async fn reset(&self, key: &str) -> Result<()> {
        self.store.delete(key).await
    }

    fn name(&self) -> &'static str {
        "fixed_window"
    }
}
