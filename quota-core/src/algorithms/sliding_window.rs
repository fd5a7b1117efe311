use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use super::{window_start, LimitInfo, RateLimitAlgorithm};
use crate::clock::Clock;
use crate::config::LimitConfig;
use crate::error::Result;
use crate::store::Store;

/// Sliding window counter decision procedure (spec §4.4): a linear blend
/// of the previous window's count approximates a true sliding window
/// without storing per-event timestamps.
pub struct SlidingWindowAlgorithm<S: Store> {
    store: Arc<S>,
    config: LimitConfig,
    clock: Arc<dyn Clock>,
}

impl<S: Store> SlidingWindowAlgorithm<S> {
    pub fn new(store: Arc<S>, config: LimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }
}

#[async_trait]
impl<S: Store> RateLimitAlgorithm for SlidingWindowAlgorithm<S> {
    async fn decide(&self, key: &str, n: u64) -> Result<(bool, LimitInfo)> {
        let now = self.clock.now();
        let cur = window_start(now, self.config.window);
        let prev = cur - self.config.window;

        let existing = self.store.get_windows(key, prev, cur).await?;
        let c_prev = existing
            .iter()
            .find(|(w, _)| *w == prev)
            .map(|(_, c)| *c)
            .unwrap_or(0);

        // f bounded to [0, 1): fraction of the current window elapsed.
        let f = (now.duration_since(cur).unwrap_or(Duration::ZERO).as_secs_f64()
            / self.config.window.as_secs_f64())
        .clamp(0.0, 1.0 - f64::EPSILON);

        let prev_weighted = c_prev as f64 * (1.0 - f);
        let budget = self.config.limit as f64 - prev_weighted;

        let result = self.store.try_increment(key, cur, n, budget).await?;

        let weighted_after = result.count as f64 + prev_weighted;
        let remaining = (self.config.limit as f64 - weighted_after).max(0.0).floor() as u64;
        let reset_at = cur + self.config.window;

        // Conservative upper bound, not the tighter solve the spec permits
        // but does not require (spec §4.4 step 6).
        let retry_after = if result.allowed {
            None
        } else {
            Some(reset_at.duration_since(now).unwrap_or(Duration::ZERO))
        };

        let info = LimitInfo {
            limit: self.config.limit,
            remaining,
            reset_at,
            retry_after,
        };

        trace!(key, allowed = result.allowed, weighted_after, "sliding_window decide");
        Ok((result.allowed, info))
    }

    async fn reset(&self, key: &str) -> Result<()> {
        self.store.delete(key).await
    }

    fn name(&self) -> &'static str {
        "sliding_window"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;
    use crate::store::LocalStore;
    use std::time::SystemTime;

    fn algo(limit: u64, window_secs: u64, clock: TestClock) -> SlidingWindowAlgorithm<LocalStore> {
        let store = Arc::new(LocalStore::new());
        let config = LimitConfig::new(limit, Duration::from_secs(window_secs), 0).unwrap();
        SlidingWindowAlgorithm::new(store, config, Arc::new(clock))
    }

    #[tokio::test]
    async fn seed_scenario_5_weighted_allow_after_partial_wait() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(3_000_000);
        let clock = TestClock::new(start);
        let a = algo(10, 1, clock.clone());
        for _ in 0..5 {
            assert!(a.decide("k", 1).await.unwrap().0);
        }
        clock.advance(Duration::from_millis(500));
        let (allowed, _) = a.decide("k", 1).await.unwrap();
        assert!(allowed);
    }

    #[tokio::test]
    async fn property_p1_cold_state_allows_exactly_limit() {
        let clock = TestClock::new(SystemTime::now());
        let a = algo(10, 1, clock);
        for _ in 0..10 {
            assert!(a.decide("k", 1).await.unwrap().0);
        }
        assert!(!a.decide("k", 1).await.unwrap().0);
    }

    #[tokio::test]
    async fn weighted_remaining_grows_monotonically_with_elapsed_fraction() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(4_000_000);
        let clock = TestClock::new(start);
        let a = algo(10, 10, clock.clone());
        // Saturate the window at `start`, then roll into the next window
        // and sample `remaining` at increasing fractions of elapsed time.
        for _ in 0..10 {
            a.decide("k", 1).await.unwrap();
        }
        clock.advance(Duration::from_secs(10));

        let mut last_remaining = 0u64;
        for step in 1..10u64 {
            clock.set(start + Duration::from_secs(10 + step));
            // n=0 is a pure status probe for windows too: it never changes
            // the stored count (adding zero), only observes it.
            let (_, info) = a.decide("k", 0).await.unwrap();
            assert!(info.remaining >= last_remaining, "remaining regressed at step {step}");
            last_remaining = info.remaining;
        }
    }

    #[tokio::test]
    async fn reset_returns_to_cold_state() {
        let clock = TestClock::new(SystemTime::now());
        let a = algo(5, 1, clock);
        for _ in 0..5 {
            a.decide("k", 1).await.unwrap();
        }
        a.reset("k").await.unwrap();
        assert!(a.decide("k", 1).await.unwrap().0);
    }
}
