use std::time::Duration;

use crate::error::{Error, Result};

/// A single limit configuration, immutable for the life of an algorithm
/// instance (spec §3 "Config").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimitConfig {
    /// Requests (windows) or tokens (bucket) per `window`.
    pub limit: u64,
    pub window: Duration,
    /// Bucket capacity override. `0` means "use `limit`" (spec §3).
    pub burst: u64,
}

impl LimitConfig {
    pub fn new(limit: u64, window: Duration, burst: u64) -> Result<Self> {
        let cfg = Self {
            limit,
            window,
            burst,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(Error::ConfigInvalid("limit must be positive".into()));
        }
        if self.window.is_zero() {
            return Err(Error::ConfigInvalid("window must be positive".into()));
        }
        Ok(())
    }

    /// `capacity = burst (or limit if burst = 0)` (spec §4.2).
    pub fn capacity(&self) -> u64 {
        if self.burst == 0 {
            self.limit
        } else {
            self.burst
        }
    }

    /// `rate = limit / window_seconds`, tokens per second (spec §4.2).
    pub fn rate_per_second(&self) -> f64 {
        self.limit as f64 / self.window.as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_zero_falls_back_to_limit() {
        let cfg = LimitConfig::new(10, Duration::from_secs(1), 0).unwrap();
        assert_eq!(cfg.capacity(), 10);
    }

    #[test]
    fn rejects_zero_limit() {
        assert!(LimitConfig::new(0, Duration::from_secs(1), 0).is_err());
    }

    #[test]
    fn rejects_zero_window() {
        assert!(LimitConfig::new(10, Duration::from_secs(0), 0).is_err());
    }
}
