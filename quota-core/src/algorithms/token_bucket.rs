use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use super::{LimitInfo, RateLimitAlgorithm};
use crate::clock::Clock;
use crate::config::LimitConfig;
use crate::error::Result;
use crate::store::Store;

/// Token bucket decision procedure (spec §4.2).
pub struct TokenBucketAlgorithm<S: Store> {
    store: Arc<S>,
    config: LimitConfig,
    clock: Arc<dyn Clock>,
}

impl<S: Store> TokenBucketAlgorithm<S> {
    pub fn new(store: Arc<S>, config: LimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }
}

#[async_trait]
impl<S: Store> RateLimitAlgorithm for TokenBucketAlgorithm<S> {
    async fn decide(&self, key: &str, n: u64) -> Result<(bool, LimitInfo)> {
        let now = self.clock.now();
        let capacity = self.config.capacity() as f64;
        let rate = self.config.rate_per_second();

        let outcome = self
            .store
            .try_consume(key, capacity, rate, now, n as f64)
            .await?;

        let retry_after = if outcome.allowed {
            None
        } else {
            let deficit = (n as f64 - outcome.tokens_after).max(0.0);
            Some(Duration::from_secs_f64(deficit / rate))
        };

        let seconds_to_full = ((capacity - outcome.tokens_after) / rate).max(0.0);
        let reset_at = now + Duration::from_secs_f64(seconds_to_full);

        let info = LimitInfo {
            limit: self.config.capacity(),
            remaining: outcome.tokens_after.floor().clamp(0.0, capacity) as u64,
            reset_at,
            retry_after,
        };

        trace!(key, allowed = outcome.allowed, remaining = info.remaining, "token_bucket decide");
        Ok((outcome.allowed, info))
    }

    async fn reset(&self, key: &str) -> Result<()> {
        self.store.delete(key).await
    }

    fn name(&self) -> &'static str {
        "token_bucket"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;
    use crate::store::LocalStore;
    use std::time::SystemTime;

    fn algo(limit: u64, window_secs: u64, burst: u64, clock: TestClock) -> TokenBucketAlgorithm<LocalStore> {
        let store = Arc::new(LocalStore::new());
        let config = LimitConfig::new(limit, Duration::from_secs(window_secs), burst).unwrap();
        TokenBucketAlgorithm::new(store, config, Arc::new(clock))
    }

    #[tokio::test]
    async fn seed_scenario_1_ten_allows_then_deny() {
        let clock = TestClock::new(SystemTime::now());
        let a = algo(10, 1, 10, clock);
        for expected_remaining in (0..10).rev() {
            let (allowed, info) = a.decide("k", 1).await.unwrap();
            assert!(allowed);
            assert_eq!(info.remaining, expected_remaining);
        }
        let (allowed, info) = a.decide("k", 1).await.unwrap();
        assert!(!allowed);
        let retry_ms = info.retry_after.unwrap().as_millis();
        assert!((90..=110).contains(&retry_ms), "retry_after was {retry_ms}ms");
    }

    #[tokio::test]
    async fn seed_scenario_2_refill_after_drain() {
        let clock = TestClock::new(SystemTime::now());
        let a = algo(10, 1, 10, clock.clone());
        for _ in 0..10 {
            a.decide("k", 1).await.unwrap();
        }
        clock.advance(Duration::from_millis(500));
        let (allowed, info) = a.decide("k", 1).await.unwrap();
        assert!(allowed);
        assert!((4..=6).contains(&info.remaining), "remaining was {}", info.remaining);
    }

    #[tokio::test]
    async fn seed_scenario_3_variable_cost() {
        let clock = TestClock::new(SystemTime::now());
        let a = algo(10, 1, 0, clock);
        let (allowed, info) = a.decide("k", 5).await.unwrap();
        assert!(allowed);
        assert_eq!(info.remaining, 5);

        let (allowed, info) = a.decide("k", 6).await.unwrap();
        assert!(!allowed);
        assert_eq!(info.remaining, 5);

        let (allowed, info) = a.decide("k", 5).await.unwrap();
        assert!(allowed);
        assert_eq!(info.remaining, 0);
    }

    #[tokio::test]
    async fn probe_with_zero_cost_always_allows_and_persists_refill() {
        let clock = TestClock::new(SystemTime::now());
        let a = algo(10, 1, 10, clock.clone());
        for _ in 0..10 {
            a.decide("k", 1).await.unwrap();
        }
        clock.advance(Duration::from_secs(1));
        let (allowed, info) = a.decide("k", 0).await.unwrap();
        assert!(allowed);
        assert_eq!(info.remaining, 10);
    }

    #[tokio::test]
    async fn reset_returns_key_to_cold_state() {
        let clock = TestClock::new(SystemTime::now());
        let a = algo(10, 1, 10, clock);
        for _ in 0..10 {
            a.decide("k", 1).await.unwrap();
        }
        a.reset("k").await.unwrap();
        let (allowed, info) = a.decide("k", 1).await.unwrap();
        assert!(allowed);
        assert_eq!(info.remaining, 9);
    }

    #[tokio::test]
    async fn independent_keys_never_affect_each_other() {
        let clock = TestClock::new(SystemTime::now());
        let a = algo(1, 1, 1, clock);
        let (allowed_a, _) = a.decide("a", 1).await.unwrap();
        let (allowed_b, _) = a.decide("b", 1).await.unwrap();
        assert!(allowed_a);
        assert!(allowed_b);
    }
}
