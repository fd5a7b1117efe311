mod fixed_window;
mod sliding_window;
mod token_bucket;

pub use fixed_window::FixedWindowAlgorithm;
pub use sliding_window::SlidingWindowAlgorithm;
pub use token_bucket::TokenBucketAlgorithm;

use async_trait::async_trait;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::Result;

/// The decision record returned to the caller on every decide (spec §3
/// "Decision record (LimitInfo)").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimitInfo {
    pub limit: u64,
    /// Never negative, never above `limit` (spec I1).
    pub remaining: u64,
    pub reset_at: SystemTime,
    /// Present iff the decision was a deny (spec I3).
    pub retry_after: Option<Duration>,
}

/// One of the three interchangeable decision procedures (spec §2 item 3).
/// Object-safe so the dispatcher can hold heterogeneous algorithms behind
/// a single `Arc<dyn RateLimitAlgorithm>` table (spec §4.5).
#[async_trait]
pub trait RateLimitAlgorithm: Send + Sync {
    async fn decide(&self, key: &str, n: u64) -> Result<(bool, LimitInfo)>;
    async fn reset(&self, key: &str) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// `window_start(t) = floor(t, W)`, aligned to the absolute epoch so all
/// servers and clients agree on boundaries (spec §4.3).
pub(crate) fn window_start(t: SystemTime, window: Duration) -> SystemTime {
    let epoch_secs = t
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs_f64();
    let window_secs = window.as_secs_f64();
    let aligned = (epoch_secs / window_secs).floor() * window_secs;
    UNIX_EPOCH + Duration::from_secs_f64(aligned.max(0.0))
}

#[cfg(test)]
mod window_tests {
    use super::*;

    #[test]
    fn aligns_to_absolute_epoch_not_first_touch() {
        let window = Duration::from_secs(10);
        let t = UNIX_EPOCH + Duration::from_secs(25);
        assert_eq!(window_start(t, window), UNIX_EPOCH + Duration::from_secs(20));
    }
}
